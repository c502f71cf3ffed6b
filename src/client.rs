//! HTTP client for the HomeSeer JSON API.
//!
//! [`HomeSeerClient`] wraps `reqwest::Client` and provides a typed method for
//! each controller operation. Every operation is a single HTTP GET to the
//! configured base URL with `request=<op>` plus `source` and authentication
//! query parameters. No retries: each invocation is exactly one network call.
//!
//! ## Response model
//!
//! Controller responses are validated into typed structs at this boundary —
//! unknown or missing fields become `Option`s instead of untyped JSON leaking
//! into the tools layer.
//!
//! ## Error handling
//!
//! Non-2xx responses are parsed for an `error` field in the JSON body; if that
//! fails, the raw body is used as the message. HTTP 401/403 are reported as
//! authentication failures.

use std::time::Duration;

use serde::Deserialize;

use crate::config::HomeSeerConfig;

/// A device mirrored from the controller's `getstatus` response.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    #[serde(rename = "ref")]
    pub device_ref: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    /// Second location axis (HomeSeer uses this for floor/area).
    #[serde(default)]
    pub location2: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub associated_devices: Option<Vec<i64>>,
}

/// A stored automation event from `getevents`.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "Group", default)]
    pub group: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(default)]
    pub voice_command: Option<String>,
    #[serde(default)]
    pub voice_command_enabled: Option<bool>,
}

/// One settable control option from `getcontrol` (e.g. "On" → 99).
#[derive(Debug, Clone, Deserialize)]
pub struct ControlPair {
    #[serde(rename = "Label", default)]
    pub label: Option<String>,
    #[serde(rename = "ControlValue", default)]
    pub control_value: f64,
    #[serde(rename = "ControlType", default)]
    pub control_type: Option<i64>,
    #[serde(rename = "Ref", default)]
    pub device_ref: Option<i64>,
}

#[derive(Deserialize)]
struct StatusResponse {
    #[serde(rename = "Devices", default)]
    devices: Vec<Device>,
}

#[derive(Deserialize)]
struct EventsResponse {
    #[serde(rename = "Events", default)]
    events: Vec<Event>,
}

#[derive(Deserialize)]
struct ControlResponse {
    #[serde(rename = "ControlPairs", default)]
    control_pairs: Vec<ControlPair>,
}

/// HTTP client bound to one configuration snapshot.
///
/// The `reqwest::Client` carries the snapshot's timeout and TLS verification
/// flag, so a config reload means building a fresh `HomeSeerClient`.
pub struct HomeSeerClient {
    http: reqwest::Client,
    config: HomeSeerConfig,
}

impl HomeSeerClient {
    /// Create a client for the controller described by `config`.
    pub fn new(config: HomeSeerConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .expect("Failed to build HTTP client");
        Self { http, config }
    }

    /// The configuration snapshot this client was built from.
    pub fn config(&self) -> &HomeSeerConfig {
        &self.config
    }

    /// `request=getstatus` — all devices known to the controller.
    pub async fn get_all_devices(&self) -> Result<Vec<Device>, ClientError> {
        let response: StatusResponse = self.request("getstatus", &[]).await?;
        Ok(response.devices)
    }

    /// `request=getstatus&ref=<n>` — one device, or a not-found error if the
    /// controller returns an empty device list for that ref.
    pub async fn get_device_by_ref(&self, device_ref: i64) -> Result<Device, ClientError> {
        let response: StatusResponse = self
            .request("getstatus", &[("ref", device_ref.to_string())])
            .await?;
        response
            .devices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound(format!("Device with ref {} not found", device_ref)))
    }

    /// `request=getcontrol&ref=<n>` — the device's control pairs. An empty
    /// list is a valid result, not an error.
    pub async fn get_control(&self, device_ref: i64) -> Result<Vec<ControlPair>, ClientError> {
        let response: ControlResponse = self
            .request("getcontrol", &[("ref", device_ref.to_string())])
            .await?;
        Ok(response.control_pairs)
    }

    /// `request=setdevicestatus&ref=<n>&value=<v>` — set a device's value.
    pub async fn set_device_status(&self, device_ref: i64, value: f64) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .request(
                "setdevicestatus",
                &[
                    ("ref", device_ref.to_string()),
                    ("value", format_value(value)),
                ],
            )
            .await?;
        Ok(())
    }

    /// `request=getevents` — all stored automation events.
    pub async fn get_events(&self) -> Result<Vec<Event>, ClientError> {
        let response: EventsResponse = self.request("getevents", &[]).await?;
        Ok(response.events)
    }

    /// `request=runevent&id=<n>` — trigger an event by id.
    pub async fn run_event_by_id(&self, event_id: i64) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .request("runevent", &[("id", event_id.to_string())])
            .await?;
        Ok(())
    }

    /// `request=runevent&group=<g>&name=<n>` — trigger an event by group and
    /// name. The controller matches both case-insensitively.
    pub async fn run_event_by_name(&self, group: &str, name: &str) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .request(
                "runevent",
                &[("group", group.to_string()), ("name", name.to_string())],
            )
            .await?;
        Ok(())
    }

    /// Issue one GET with `request=<op>`, `source`, auth, and `extra` query
    /// parameters, then deserialize the JSON body.
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        extra: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let mut url = reqwest::Url::parse(self.config.base_url())
            .map_err(|e| ClientError::Protocol(format!("Invalid base URL: {}", e)))?;

        let mut params = vec![("request", operation.to_string())];
        params.extend(extra.iter().map(|(k, v)| (*k, v.clone())));
        for (key, value) in self.config.request_params(&params) {
            url.query_pairs_mut().append_pair(&key, &value);
        }

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ClientError::Request)?;
        Self::handle_response(resp).await
    }

    /// Parse an HTTP response — deserializes the JSON body on success, or
    /// extracts an error message on failure.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        let body = resp.text().await.map_err(ClientError::Request)?;

        if status.is_success() {
            serde_json::from_str(&body).map_err(|e| {
                ClientError::Protocol(format!("Invalid JSON from controller: {}", e))
            })
        } else {
            // Try to extract an error message from the JSON body
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v["error"].as_str().map(String::from))
                .unwrap_or(body);
            Err(ClientError::Controller {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Render a control value for the query string: `99` rather than `99.0` for
/// whole numbers, since HomeSeer control values are usually integral.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Errors returned by [`HomeSeerClient`] methods.
#[derive(Debug)]
pub enum ClientError {
    /// HTTP transport error (connection refused, timeout, DNS failure, etc.).
    Request(reqwest::Error),
    /// The controller returned a non-2xx HTTP status.
    Controller { status: u16, message: String },
    /// The response body was not valid JSON or not the expected shape.
    Protocol(String),
    /// The requested device, control, or event does not exist.
    NotFound(String),
}

impl ClientError {
    /// Returns `true` if the controller rejected the configured credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Controller { status: 401 | 403, .. })
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Request(e) => write!(f, "HTTP request failed: {}", e),
            ClientError::Controller { status, message } if self.is_auth() => {
                write!(f, "Authentication failed (HTTP {}): {}", status, message)
            }
            ClientError::Controller { status, message } => {
                write!(f, "Controller error (HTTP {}): {}", status, message)
            }
            ClientError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            ClientError::NotFound(msg) => write!(f, "Not found: {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_deserializes_full_payload() {
        let device: Device = serde_json::from_str(
            r#"{
                "ref": 123,
                "name": "Porch Light",
                "location": "Porch",
                "location2": "Outside",
                "value": 99.0,
                "status": "On",
                "associated_devices": [124, 125]
            }"#,
        )
        .unwrap();
        assert_eq!(device.device_ref, 123);
        assert_eq!(device.name, "Porch Light");
        assert_eq!(device.location.as_deref(), Some("Porch"));
        assert_eq!(device.value, Some(99.0));
        assert_eq!(device.associated_devices, Some(vec![124, 125]));
    }

    #[test]
    fn device_missing_fields_become_none() {
        let device: Device = serde_json::from_str(r#"{"ref": 7, "name": "Sensor"}"#).unwrap();
        assert_eq!(device.location, None);
        assert_eq!(device.value, None);
        assert_eq!(device.status, None);
        assert_eq!(device.associated_devices, None);
    }

    #[test]
    fn status_response_without_devices_key() {
        let response: StatusResponse = serde_json::from_str(r#"{"Name": "HomeSeer"}"#).unwrap();
        assert!(response.devices.is_empty());
    }

    #[test]
    fn event_deserializes_controller_casing() {
        let event: Event = serde_json::from_str(
            r#"{
                "Group": "Lighting",
                "Name": "Outside Lights Off",
                "id": 5,
                "voice_command": "outside lights off",
                "voice_command_enabled": true
            }"#,
        )
        .unwrap();
        assert_eq!(event.group, "Lighting");
        assert_eq!(event.name, "Outside Lights Off");
        assert_eq!(event.id, Some(5));
        assert_eq!(event.voice_command_enabled, Some(true));
    }

    #[test]
    fn control_pairs_deserialize() {
        let response: ControlResponse = serde_json::from_str(
            r#"{
                "Devices": null,
                "ControlPairs": [
                    {"Label": "On", "ControlValue": 99, "ControlType": 5, "Ref": 123},
                    {"Label": "Off", "ControlValue": 0, "ControlType": 6, "Ref": 123},
                    {"ControlValue": 50}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(response.control_pairs.len(), 3);
        assert_eq!(response.control_pairs[0].label.as_deref(), Some("On"));
        assert_eq!(response.control_pairs[0].control_value, 99.0);
        assert_eq!(response.control_pairs[2].label, None);
    }

    #[test]
    fn control_response_without_pairs_key_is_empty() {
        // A device with no controls comes back without a ControlPairs key;
        // that is an empty result, not an error.
        let response: ControlResponse = serde_json::from_str(r#"{"Devices": []}"#).unwrap();
        assert!(response.control_pairs.is_empty());
    }

    #[test]
    fn control_response_with_empty_pairs_is_empty() {
        let response: ControlResponse =
            serde_json::from_str(r#"{"ControlPairs": []}"#).unwrap();
        assert!(response.control_pairs.is_empty());
    }

    #[test]
    fn format_value_whole_numbers() {
        assert_eq!(format_value(99.0), "99");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(50.5), "50.5");
    }

    #[test]
    fn auth_error_detection() {
        let err = ClientError::Controller {
            status: 401,
            message: "bad credentials".into(),
        };
        assert!(err.is_auth());
        assert!(err.to_string().starts_with("Authentication failed"));

        let err = ClientError::Controller {
            status: 500,
            message: "boom".into(),
        };
        assert!(!err.is_auth());
        assert!(err.to_string().starts_with("Controller error"));
    }

    #[test]
    fn not_found_display() {
        let err = ClientError::NotFound("Device with ref 9 not found".into());
        assert_eq!(err.to_string(), "Not found: Device with ref 9 not found");
    }
}
