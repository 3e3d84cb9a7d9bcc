//! HTTP request handlers.
//!
//! Bodies are parsed as raw JSON rather than through `axum::Json` so that
//! every malformed request gets a 400 with a field-specific reason instead of
//! the extractor's generic rejection. Field checks run in a fixed order and
//! the first failure wins.

use super::error_mapping::ApiError;
use super::router::HttpState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::Json;
use phidget_core::{ChannelAddress, OUTPUT_VOLTAGE_RANGE};
use phidget_hardware::{DeliverySnapshot, ResourceStatus};
use serde::Serialize;
use serde_json::{Map, Value};

const ACK: &str = "ACK";

type JsonObject = Map<String, Value>;

/// Parsed `POST /phidgets/digital_out` body.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitalOutCommand {
    /// Resource name
    pub name: String,
    /// Requested output state
    pub target_state: bool,
    /// Address fields, `-2` when omitted
    pub address: ChannelAddress,
}

/// Parsed `POST /phidgets/voltage_out` body.
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageOutCommand {
    /// Resource name
    pub name: String,
    /// Requested voltage
    pub target_state: f64,
    /// Address fields, `-2` when omitted
    pub address: ChannelAddress,
}

/// Parsed `POST /phidgets/digital_in` body.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitalInCommand {
    /// Resource name
    pub name: String,
    /// Address fields, `-2` when omitted
    pub address: ChannelAddress,
    /// Subscriber URL; empty or null means none
    pub webhook: Option<String>,
}

fn parse_object(body: &[u8]) -> Result<JsonObject, ApiError> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(object)) => Ok(object),
        _ => Err(ApiError::bad_request("bad request")),
    }
}

fn require_fields(data: &JsonObject, fields: &[&str], usage: &str) -> Result<(), ApiError> {
    if fields.iter().all(|field| data.contains_key(*field)) {
        Ok(())
    } else {
        Err(ApiError::bad_request(usage))
    }
}

fn name_field(data: &JsonObject) -> Result<String, ApiError> {
    data.get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("name must be a string"))
}

fn as_i32(value: &Value) -> Option<i32> {
    value.as_i64().and_then(|n| i32::try_from(n).ok())
}

/// Optional address field; absent means "use the existing resource".
fn address_field(data: &JsonObject, field: &str) -> Result<i32, ApiError> {
    match data.get(field) {
        None => Ok(ChannelAddress::USE_EXISTING),
        Some(value) => {
            as_i32(value).ok_or_else(|| ApiError::bad_request(format!("{field} must be an integer")))
        }
    }
}

fn address(data: &JsonObject) -> Result<ChannelAddress, ApiError> {
    let channel = address_field(data, "channel")?;
    let hub_port = address_field(data, "hub_port")?;
    Ok(ChannelAddress::new(channel, hub_port))
}

/// Parse a `digital_out` body.
pub fn parse_digital_out(body: &[u8]) -> Result<DigitalOutCommand, ApiError> {
    let data = parse_object(body)?;
    require_fields(
        &data,
        &["name", "target_state"],
        "requires name (str) and target_state (bool)",
    )?;
    let name = name_field(&data)?;
    let target_state = data
        .get("target_state")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::bad_request("target_state must be a boolean"))?;
    Ok(DigitalOutCommand {
        name,
        target_state,
        address: address(&data)?,
    })
}

/// Parse a `voltage_out` body; the voltage range is checked here.
pub fn parse_voltage_out(body: &[u8]) -> Result<VoltageOutCommand, ApiError> {
    let data = parse_object(body)?;
    require_fields(
        &data,
        &["name", "target_state"],
        "requires name (str) and target_state (float)",
    )?;
    let name = name_field(&data)?;
    let target_state = data
        .get("target_state")
        .and_then(Value::as_f64)
        .ok_or_else(|| ApiError::bad_request("target_state must be an int or float"))?;
    if !OUTPUT_VOLTAGE_RANGE.contains(&target_state) {
        return Err(ApiError::bad_request("target_state must be +/- 10V"));
    }
    Ok(VoltageOutCommand {
        name,
        target_state,
        address: address(&data)?,
    })
}

/// Parse a `digital_in` body.
pub fn parse_digital_in(body: &[u8]) -> Result<DigitalInCommand, ApiError> {
    const USAGE: &str = "requires name (str), channel (int), hub_port (int)";
    let usage = || ApiError::bad_request(USAGE);

    let data = parse_object(body).map_err(|_| usage())?;
    let name = data.get("name").and_then(Value::as_str).ok_or_else(usage)?;
    let channel = data.get("channel").and_then(as_i32).ok_or_else(usage)?;
    let hub_port = data.get("hub_port").and_then(as_i32).ok_or_else(usage)?;
    let webhook = match data.get("webhook") {
        None | Some(Value::Null) => None,
        Some(Value::String(url)) if url.is_empty() => None,
        Some(Value::String(url)) => Some(url.clone()),
        Some(_) => return Err(usage()),
    };
    Ok(DigitalInCommand {
        name: name.to_string(),
        address: ChannelAddress::new(channel, hub_port),
        webhook,
    })
}

/// Parse a `close` body into the name to close.
pub fn parse_close(body: &[u8]) -> Result<String, ApiError> {
    let data = parse_object(body)?;
    require_fields(&data, &["name"], "requires name (str)")?;
    name_field(&data)
}

/// `POST /phidgets/digital_out`
pub async fn set_digital_output(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let command = parse_digital_out(&body)?;
    state
        .service
        .set_digital_output(&command.name, command.target_state, command.address)
        .await?;
    Ok(ACK)
}

/// `POST /phidgets/voltage_out`
pub async fn set_voltage_output(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let command = parse_voltage_out(&body)?;
    state
        .service
        .set_voltage_output(&command.name, command.target_state, command.address)
        .await?;
    Ok(ACK)
}

/// `POST /phidgets/digital_in`
pub async fn open_digital_input(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let command = parse_digital_in(&body)?;
    state
        .service
        .open_digital_input(&command.name, command.address, command.webhook.as_deref())
        .await?;
    Ok(ACK)
}

/// `POST /phidgets/close`
pub async fn close_channel(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let name = parse_close(&body)?;
    state.service.close(&name).await?;
    Ok(ACK)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON array with four-space indentation, as shown on the state page.
pub fn pretty_json(statuses: &[ResourceStatus]) -> Result<String, ApiError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    statuses
        .serialize(&mut serializer)
        .map_err(|e| ApiError::internal(format!("failed to render state: {}", e)))?;
    String::from_utf8(buf).map_err(|e| ApiError::internal(format!("failed to render state: {}", e)))
}

/// HTML page with the status list as indented JSON.
pub fn render_state_page(title: &str, statuses: &[ResourceStatus]) -> Result<String, ApiError> {
    let json = pretty_json(statuses)?;
    Ok(format!(
        r#"
<!DOCTYPE html>
<html>
<head>
    <title>{title}</title>
</head>
<body>
    <p>[OK] /services/actuators/phidgets<p>
    <pre>
{json}
    </pre>
</body>
</html>"#,
        title = escape_html(title),
        json = escape_html(&json),
    ))
}

/// `GET /phidgets/state`
pub async fn state_page(State(state): State<HttpState>) -> Result<Html<String>, ApiError> {
    let statuses = state.service.snapshot().await;
    render_state_page(&state.state_page_title, &statuses).map(Html)
}

/// `GET /phidgets/state.json`
pub async fn state_json(State(state): State<HttpState>) -> Json<Vec<ResourceStatus>> {
    Json(state.service.snapshot().await)
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server answers
    pub status: &'static str,
    /// Gateway version
    pub version: &'static str,
    /// Names currently open
    pub resources: usize,
    /// Webhook subscriptions across all names
    pub webhook_subscriptions: usize,
    /// Delivery counters since start
    pub webhook_deliveries: DeliverySnapshot,
}

/// `GET /health`
pub async fn health(State(state): State<HttpState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        resources: state.service.resources().len(),
        webhook_subscriptions: state.service.webhooks().subscription_count(),
        webhook_deliveries: state.service.delivery_stats(),
    })
}

/// `GET /` redirects to the state page.
pub async fn root_redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/phidgets/state")])
}
