//! Mapping of gateway errors to HTTP responses.
//!
//! Every handler failure becomes a plain-text body with the reason, never a
//! JSON envelope, so existing clients can show the text as-is.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use phidget_core::GatewayError;

/// Terminal error for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Response status
    pub status: StatusCode,
    /// Plain-text response body
    pub message: String,
    /// Resource the failure refers to; logged, never sent
    pub resource: Option<String>,
}

impl ApiError {
    /// 400 with `message` as the body.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            resource: None,
        }
    }

    /// 500 with `message` as the body.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            resource: None,
        }
    }
}

/// Status code for a gateway error.
pub fn status_for(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::Validation(_)
        | GatewayError::MissingHardwareAddress { .. }
        | GatewayError::NotFound { .. }
        | GatewayError::Close { .. } => StatusCode::BAD_REQUEST,
        GatewayError::HardwareOpen { .. }
        | GatewayError::Hardware { .. }
        | GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
            resource: err.resource_name().map(str::to_string),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let resource = self.resource.as_deref().unwrap_or("-");
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                resource,
                message = %self.message,
                "Request failed"
            );
        } else {
            tracing::debug!(
                status = %self.status,
                resource,
                message = %self.message,
                "Request rejected"
            );
        }
        (self.status, self.message).into_response()
    }
}
