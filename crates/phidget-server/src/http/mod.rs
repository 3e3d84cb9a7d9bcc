//! HTTP surface.
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /phidgets/digital_out` | [`handlers::set_digital_output`] |
//! | `POST /phidgets/voltage_out` | [`handlers::set_voltage_output`] |
//! | `POST /phidgets/digital_in` | [`handlers::open_digital_input`] |
//! | `POST /phidgets/close` | [`handlers::close_channel`] |
//! | `GET /phidgets/state` | [`handlers::state_page`] |
//! | `GET /phidgets/state.json` | [`handlers::state_json`] |
//! | `GET /health` | [`handlers::health`] |
//! | `GET /` | 302 to `/phidgets/state` |

pub mod error_mapping;
pub mod handlers;
pub mod router;

pub use error_mapping::ApiError;
pub use router::{create_router, serve, HttpState};
