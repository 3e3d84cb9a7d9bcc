//! Gateway client.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Request timeout used by [`GatewayClient::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct DigitalOutRequest<'a> {
    name: &'a str,
    target_state: bool,
    channel: i32,
    hub_port: i32,
}

#[derive(Debug, Serialize)]
struct VoltageOutRequest<'a> {
    name: &'a str,
    target_state: f64,
    channel: i32,
    hub_port: i32,
}

#[derive(Debug, Serialize)]
struct DigitalInRequest<'a> {
    name: &'a str,
    channel: i32,
    hub_port: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CloseRequest<'a> {
    name: &'a str,
}

/// One entry of `GET /phidgets/state.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelStatus {
    /// Resource name
    pub name: String,
    /// `DigitalOutput`, `VoltageOutput` or `DigitalInput`
    #[serde(rename = "type")]
    pub kind: String,
    /// Digital state, for digital kinds
    #[serde(default)]
    pub state: Option<bool>,
    /// Output level, for voltage outputs
    #[serde(default)]
    pub voltage: Option<f64>,
}

/// Client for one gateway instance.
///
/// Address arguments take the gateway's sentinels: `-2` to reuse an already
/// open name, `-1` to fail if the name is unknown.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base: Url,
    http: reqwest::Client,
}

impl GatewayClient {
    /// Create a client with the default 5 s timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Self::with_client(base_url, http)
    }

    /// Create a client around an existing `reqwest::Client`.
    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        // Url::join replaces the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, http })
    }

    async fn post_json<T: Serialize>(&self, path: &str, payload: &T) -> Result<()> {
        let url = self.base.join(path)?;
        debug!(%url, "POST");
        let response = self.http.post(url).json(payload).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// `POST /phidgets/digital_out`
    pub async fn set_digital_output(
        &self,
        name: &str,
        state: bool,
        channel: i32,
        hub_port: i32,
    ) -> Result<()> {
        self.post_json(
            "phidgets/digital_out",
            &DigitalOutRequest {
                name,
                target_state: state,
                channel,
                hub_port,
            },
        )
        .await
    }

    /// `POST /phidgets/voltage_out`
    pub async fn set_voltage_output(
        &self,
        name: &str,
        volts: f64,
        channel: i32,
        hub_port: i32,
    ) -> Result<()> {
        self.post_json(
            "phidgets/voltage_out",
            &VoltageOutRequest {
                name,
                target_state: volts,
                channel,
                hub_port,
            },
        )
        .await
    }

    /// `POST /phidgets/digital_in`, optionally subscribing `webhook`.
    pub async fn open_digital_input(
        &self,
        name: &str,
        channel: i32,
        hub_port: i32,
        webhook: Option<&str>,
    ) -> Result<()> {
        self.post_json(
            "phidgets/digital_in",
            &DigitalInRequest {
                name,
                channel,
                hub_port,
                webhook,
            },
        )
        .await
    }

    /// `POST /phidgets/close`
    pub async fn close(&self, name: &str) -> Result<()> {
        self.post_json("phidgets/close", &CloseRequest { name }).await
    }

    /// `GET /phidgets/state.json`
    pub async fn state(&self) -> Result<Vec<ChannelStatus>> {
        let url = self.base.join("phidgets/state.json")?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = GatewayClient::new("http://localhost:4002/gateway").unwrap();
        assert_eq!(client.base.as_str(), "http://localhost:4002/gateway/");
        assert_eq!(
            client.base.join("phidgets/close").unwrap().as_str(),
            "http://localhost:4002/gateway/phidgets/close"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = GatewayClient::new("not a url").unwrap_err();
        assert!(matches!(err, ClientError::UrlParse(_)));
    }

    #[test]
    fn test_digital_in_omits_missing_webhook() {
        let body = serde_json::to_value(DigitalInRequest {
            name: "door",
            channel: 0,
            hub_port: 1,
            webhook: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"name": "door", "channel": 0, "hub_port": 1})
        );
    }
}
