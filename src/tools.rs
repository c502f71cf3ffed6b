//! MCP tool definitions and handlers.
//!
//! Each tool is defined as a JSON schema (returned by [`tool_definitions`])
//! and handled by an async function dispatched from [`handle_tool_call`].
//! Every handler follows the same shape: validate arguments, make one
//! [`HomeSeerClient`](crate::client::HomeSeerClient) call (the by-label
//! variant makes two), reshape the response.
//!
//! ## Tools
//!
//! - `list_all_devices` — device listing with name filter and optional rooms
//! - `get_device_info` — details for one device ref
//! - `get_control` — a device's available control options
//! - `control_homeseer_device` — set a device value by control id
//! - `control_homeseer_device_by_label` — set a device value by control label
//! - `get_events` — event listing with group/name filter
//! - `run_event` — trigger an event by id or by group+name
//!
//! Filtering, reshaping, and argument validation are pure functions over the
//! typed model so they are unit-tested without a controller.

use serde_json::{json, Value};

use crate::client::{ControlPair, Device, Event};
use crate::homeseer::HomeSeerHandle;

/// Returns all tool definitions for `tools/list`.
pub fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "list_all_devices",
            "description": "List HomeSeer devices with optional name filtering. Returns ref and name for each device; set need_room_information to also get location fields. Use the ref with get_device_info, get_control, and the control tools.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "free_text_search": {
                        "type": "string",
                        "description": "Keep only devices whose name contains this text (case-insensitive)."
                    },
                    "need_room_information": {
                        "type": "boolean",
                        "description": "Include location and location2 (room/floor) fields. Default false."
                    }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_device_info",
            "description": "Get detailed information about one device: name, location, value, status, and associated device refs.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device_ref": {
                        "type": "integer",
                        "description": "Device reference ID (from list_all_devices)."
                    }
                },
                "required": ["device_ref"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_control",
            "description": "Get the available control options for a device (e.g. On/Off, dimmer levels). Each entry has a label, a value, and a control type. An empty list means the device is not controllable.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device_ref": {
                        "type": "integer",
                        "description": "Device reference ID."
                    }
                },
                "required": ["device_ref"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "control_homeseer_device",
            "description": "Control a device by numeric control value. Use get_control to find the valid values for a device.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device_id": {
                        "type": "integer",
                        "description": "Device reference ID."
                    },
                    "control_id": {
                        "type": "number",
                        "description": "Control value to set (from get_control)."
                    }
                },
                "required": ["device_id", "control_id"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "control_homeseer_device_by_label",
            "description": "Control a device by a human-readable control label like 'On', 'Off', or 'Dim 50%'. The label is matched case-insensitively against the device's available controls (see get_control).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "device_ref": {
                        "type": "integer",
                        "description": "Device reference ID."
                    },
                    "label": {
                        "type": "string",
                        "description": "Control label to apply (case-insensitive exact match)."
                    }
                },
                "required": ["device_ref", "label"],
                "additionalProperties": false
            }
        }),
        json!({
            "name": "get_events",
            "description": "List HomeSeer automation events with optional filtering. Each event has a Group and a Name usable with run_event.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "free_text_search": {
                        "type": "string",
                        "description": "Keep only events whose Group or Name contains this text (case-insensitive)."
                    }
                },
                "additionalProperties": false
            }
        }),
        json!({
            "name": "run_event",
            "description": "Trigger a HomeSeer automation event. Provide either event_id alone, or both group and name (matched case-insensitively by the controller). Use get_events to discover events.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "event_id": {
                        "type": "integer",
                        "description": "Event ID. Mutually exclusive with group/name."
                    },
                    "group": {
                        "type": "string",
                        "description": "Event group name. Requires name."
                    },
                    "name": {
                        "type": "string",
                        "description": "Event name. Requires group."
                    }
                },
                "additionalProperties": false
            }
        }),
    ]
}

/// Handle a tool call and return MCP content.
pub async fn handle_tool_call(name: &str, args: &Value, handle: &HomeSeerHandle) -> ToolResult {
    match name {
        "list_all_devices" => handle_list_all_devices(args, handle).await,
        "get_device_info" => handle_get_device_info(args, handle).await,
        "get_control" => handle_get_control(args, handle).await,
        "control_homeseer_device" => handle_control_device(args, handle).await,
        "control_homeseer_device_by_label" => handle_control_device_by_label(args, handle).await,
        "get_events" => handle_get_events(args, handle).await,
        "run_event" => handle_run_event(args, handle).await,
        _ => ToolResult::error(format!("Unknown tool: {}", name)),
    }
}

/// Result of an MCP tool call, ready to be serialized into a JSON-RPC response.
pub struct ToolResult {
    /// MCP content blocks (typically a single `{"type":"text","text":"..."}` entry).
    pub content: Vec<Value>,
    /// Whether the tool call failed (maps to `isError` in the MCP response).
    pub is_error: bool,
}

impl ToolResult {
    fn success(value: Value) -> Self {
        let text = serde_json::to_string_pretty(&value).unwrap_or_default();
        Self {
            content: vec![json!({ "type": "text", "text": text })],
            is_error: false,
        }
    }

    fn error(message: String) -> Self {
        Self {
            content: vec![json!({ "type": "text", "text": message })],
            is_error: true,
        }
    }
}

fn require_i64(args: &Value, key: &str) -> Result<i64, String> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("Missing required parameter: {} (integer)", key))
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Missing required parameter: {}", key))
}

// --- Pure filtering / reshaping ---

/// Case-insensitive substring filter on device names.
fn filter_devices<'a>(devices: &'a [Device], search: Option<&str>) -> Vec<&'a Device> {
    match search {
        Some(needle) => {
            let needle = needle.to_lowercase();
            devices
                .iter()
                .filter(|d| d.name.to_lowercase().contains(&needle))
                .collect()
        }
        None => devices.iter().collect(),
    }
}

/// Shape one device for `list_all_devices`. Location fields are attached only
/// when requested — never passed through from the raw payload otherwise.
fn device_summary(device: &Device, include_rooms: bool) -> Value {
    let mut entry = json!({
        "ref": device.device_ref,
        "name": device.name,
    });
    if include_rooms {
        entry["location"] = json!(device.location.as_deref().unwrap_or(""));
        entry["location2"] = json!(device.location2.as_deref().unwrap_or(""));
    }
    entry
}

/// Case-insensitive substring filter against event Group or Name.
fn filter_events<'a>(events: &'a [Event], search: Option<&str>) -> Vec<&'a Event> {
    match search {
        Some(needle) => {
            let needle = needle.to_lowercase();
            events
                .iter()
                .filter(|e| {
                    e.group.to_lowercase().contains(&needle)
                        || e.name.to_lowercase().contains(&needle)
                })
                .collect()
        }
        None => events.iter().collect(),
    }
}

fn event_summary(event: &Event) -> Value {
    let mut entry = json!({
        "id": event.id,
        "Group": event.group,
        "Name": event.name,
    });
    if let Some(vc) = &event.voice_command {
        entry["voice_command"] = json!(vc);
    }
    if let Some(enabled) = event.voice_command_enabled {
        entry["voice_command_enabled"] = json!(enabled);
    }
    entry
}

fn control_summary(pair: &ControlPair) -> Value {
    json!({
        "label": pair.label,
        "value": pair.control_value,
        "control_type": pair.control_type,
    })
}

/// Resolve a control label to its control value by case-insensitive exact
/// match against the device's control pairs. Folds case the same way the
/// device and event filters do, so non-ASCII labels match too.
fn resolve_control_by_label(pairs: &[ControlPair], label: &str) -> Option<f64> {
    let needle = label.to_lowercase();
    pairs
        .iter()
        .find(|p| {
            p.label
                .as_deref()
                .is_some_and(|l| l.to_lowercase() == needle)
        })
        .map(|p| p.control_value)
}

/// Validated target for `run_event`.
#[derive(Debug, PartialEq)]
enum RunEventTarget {
    ById(i64),
    ByName { group: String, name: String },
}

/// `run_event` accepts either `event_id` alone or both `group` and `name`;
/// anything else (neither, both forms, half a pair) is an invalid argument.
fn parse_run_event_args(args: &Value) -> Result<RunEventTarget, String> {
    let event_id = args.get("event_id").and_then(Value::as_i64);
    let group = args.get("group").and_then(Value::as_str);
    let name = args.get("name").and_then(Value::as_str);

    match (event_id, group, name) {
        (Some(id), None, None) => Ok(RunEventTarget::ById(id)),
        (None, Some(group), Some(name)) => Ok(RunEventTarget::ByName {
            group: group.to_string(),
            name: name.to_string(),
        }),
        (Some(_), g, n) if g.is_some() || n.is_some() => {
            Err("Provide either event_id or group+name, not both".to_string())
        }
        _ => Err("Must provide either event_id or both group and name".to_string()),
    }
}

// --- Handlers ---

async fn handle_list_all_devices(args: &Value, handle: &HomeSeerHandle) -> ToolResult {
    let search = args.get("free_text_search").and_then(Value::as_str);
    let include_rooms = args
        .get("need_room_information")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let client = handle.client().await;
    let devices = match client.get_all_devices().await {
        Ok(d) => d,
        Err(e) => return ToolResult::error(e.to_string()),
    };

    let result: Vec<Value> = filter_devices(&devices, search)
        .into_iter()
        .map(|d| device_summary(d, include_rooms))
        .collect();

    eprintln!(
        "mcp-homeseer: listed {} of {} devices",
        result.len(),
        devices.len()
    );
    ToolResult::success(json!({ "devices": result }))
}

async fn handle_get_device_info(args: &Value, handle: &HomeSeerHandle) -> ToolResult {
    let device_ref = match require_i64(args, "device_ref") {
        Ok(r) => r,
        Err(e) => return ToolResult::error(e),
    };

    let client = handle.client().await;
    let device = match client.get_device_by_ref(device_ref).await {
        Ok(d) => d,
        Err(e) => return ToolResult::error(e.to_string()),
    };

    ToolResult::success(json!({
        "name": device.name,
        "location": device.location,
        "location2": device.location2,
        "value": device.value,
        "status": device.status,
        "associated_devices": device.associated_devices,
    }))
}

async fn handle_get_control(args: &Value, handle: &HomeSeerHandle) -> ToolResult {
    let device_ref = match require_i64(args, "device_ref") {
        Ok(r) => r,
        Err(e) => return ToolResult::error(e),
    };

    let client = handle.client().await;
    match client.get_control(device_ref).await {
        Ok(pairs) => {
            let controls: Vec<Value> = pairs.iter().map(control_summary).collect();
            ToolResult::success(json!({ "controls": controls }))
        }
        Err(e) => ToolResult::error(e.to_string()),
    }
}

async fn handle_control_device(args: &Value, handle: &HomeSeerHandle) -> ToolResult {
    let device_id = match require_i64(args, "device_id") {
        Ok(r) => r,
        Err(e) => return ToolResult::error(e),
    };
    let control_id = match args.get("control_id").and_then(Value::as_f64) {
        Some(v) => v,
        None => return ToolResult::error("Missing required parameter: control_id (number)".into()),
    };

    let client = handle.client().await;
    match client.set_device_status(device_id, control_id).await {
        Ok(()) => {
            eprintln!(
                "mcp-homeseer: set device {} to value {}",
                device_id, control_id
            );
            ToolResult::success(json!({
                "success": true,
                "ref": device_id,
                "value": control_id,
            }))
        }
        Err(e) => ToolResult::error(e.to_string()),
    }
}

async fn handle_control_device_by_label(args: &Value, handle: &HomeSeerHandle) -> ToolResult {
    let device_ref = match require_i64(args, "device_ref") {
        Ok(r) => r,
        Err(e) => return ToolResult::error(e),
    };
    let label = match require_str(args, "label") {
        Ok(l) => l,
        Err(e) => return ToolResult::error(e),
    };

    let client = handle.client().await;
    let pairs = match client.get_control(device_ref).await {
        Ok(p) => p,
        Err(e) => return ToolResult::error(e.to_string()),
    };

    let value = match resolve_control_by_label(&pairs, label) {
        Some(v) => v,
        None => {
            return ToolResult::error(format!(
                "Not found: no control labeled '{}' on device {}",
                label, device_ref
            ));
        }
    };

    match client.set_device_status(device_ref, value).await {
        Ok(()) => {
            eprintln!(
                "mcp-homeseer: set device {} to '{}' (value {})",
                device_ref, label, value
            );
            ToolResult::success(json!({
                "success": true,
                "ref": device_ref,
                "label": label,
                "value": value,
            }))
        }
        Err(e) => ToolResult::error(e.to_string()),
    }
}

async fn handle_get_events(args: &Value, handle: &HomeSeerHandle) -> ToolResult {
    let search = args.get("free_text_search").and_then(Value::as_str);

    let client = handle.client().await;
    let events = match client.get_events().await {
        Ok(e) => e,
        Err(e) => return ToolResult::error(e.to_string()),
    };

    let result: Vec<Value> = filter_events(&events, search)
        .into_iter()
        .map(event_summary)
        .collect();

    eprintln!(
        "mcp-homeseer: listed {} of {} events",
        result.len(),
        events.len()
    );
    ToolResult::success(json!({ "events": result }))
}

async fn handle_run_event(args: &Value, handle: &HomeSeerHandle) -> ToolResult {
    let target = match parse_run_event_args(args) {
        Ok(t) => t,
        Err(e) => return ToolResult::error(e),
    };

    let client = handle.client().await;
    let outcome = match &target {
        RunEventTarget::ById(id) => client.run_event_by_id(*id).await,
        RunEventTarget::ByName { group, name } => client.run_event_by_name(group, name).await,
    };

    match outcome {
        Ok(()) => {
            let detail = match target {
                RunEventTarget::ById(id) => json!({ "success": true, "event_id": id }),
                RunEventTarget::ByName { group, name } => {
                    json!({ "success": true, "group": group, "name": name })
                }
            };
            ToolResult::success(detail)
        }
        Err(e) => ToolResult::error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HomeSeerConfig;

    fn device(device_ref: i64, name: &str, location: Option<&str>) -> Device {
        serde_json::from_value(json!({
            "ref": device_ref,
            "name": name,
            "location": location,
        }))
        .unwrap()
    }

    fn event(group: &str, name: &str, id: i64) -> Event {
        serde_json::from_value(json!({ "Group": group, "Name": name, "id": id })).unwrap()
    }

    fn pair(label: &str, value: f64) -> ControlPair {
        serde_json::from_value(json!({ "Label": label, "ControlValue": value })).unwrap()
    }

    #[test]
    fn filter_devices_case_insensitive_substring() {
        let devices = vec![
            device(1, "Kitchen Light", None),
            device(2, "Porch light", None),
            device(3, "Thermostat", None),
        ];
        let hits = filter_devices(&devices, Some("LIGHT"));
        let refs: Vec<i64> = hits.iter().map(|d| d.device_ref).collect();
        assert_eq!(refs, vec![1, 2]);
    }

    #[test]
    fn filter_devices_no_search_returns_all() {
        let devices = vec![device(1, "A", None), device(2, "B", None)];
        assert_eq!(filter_devices(&devices, None).len(), 2);
    }

    #[test]
    fn device_summary_omits_location_when_not_requested() {
        let d = device(5, "Lamp", Some("Living Room"));
        let entry = device_summary(&d, false);
        assert_eq!(entry["ref"], 5);
        assert_eq!(entry["name"], "Lamp");
        // Location present in the remote payload must not leak through
        assert!(entry.get("location").is_none());
        assert!(entry.get("location2").is_none());
    }

    #[test]
    fn device_summary_includes_location_when_requested() {
        let d = device(5, "Lamp", Some("Living Room"));
        let entry = device_summary(&d, true);
        assert_eq!(entry["location"], "Living Room");
        // Missing location2 renders as an empty string
        assert_eq!(entry["location2"], "");
    }

    #[test]
    fn filter_events_matches_group_or_name() {
        let events = vec![
            event("Kitchen", "Lights On", 1),
            event("Lighting", "Kitchen Off", 2),
            event("Lighting", "Outside Off", 3),
        ];
        let hits = filter_events(&events, Some("kitchen"));
        let ids: Vec<Option<i64>> = hits.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
    }

    #[test]
    fn filter_events_no_search_returns_all() {
        let events = vec![event("A", "B", 1), event("C", "D", 2)];
        assert_eq!(filter_events(&events, None).len(), 2);
    }

    #[test]
    fn resolve_label_is_case_insensitive() {
        let pairs = vec![pair("on", 99.0), pair("Off", 0.0)];
        assert_eq!(resolve_control_by_label(&pairs, "On"), Some(99.0));
        assert_eq!(resolve_control_by_label(&pairs, "OFF"), Some(0.0));
    }

    #[test]
    fn resolve_label_requires_exact_match() {
        let pairs = vec![pair("Dim 50%", 50.0)];
        // Substrings are not enough for control resolution
        assert_eq!(resolve_control_by_label(&pairs, "Dim"), None);
        assert_eq!(resolve_control_by_label(&pairs, "dim 50%"), Some(50.0));
    }

    #[test]
    fn resolve_label_folds_non_ascii_case() {
        let pairs = vec![pair("Öffnen", 99.0), pair("SCHLIESSEN", 0.0)];
        assert_eq!(resolve_control_by_label(&pairs, "öffnen"), Some(99.0));
        assert_eq!(resolve_control_by_label(&pairs, "ÖFFNEN"), Some(99.0));
        assert_eq!(resolve_control_by_label(&pairs, "schliessen"), Some(0.0));
    }

    #[test]
    fn resolve_label_unmatched_is_none() {
        let pairs = vec![pair("On", 99.0)];
        assert_eq!(resolve_control_by_label(&pairs, "Close"), None);
    }

    #[test]
    fn resolve_label_skips_unlabeled_pairs() {
        let pairs: Vec<ControlPair> =
            vec![serde_json::from_value(json!({ "ControlValue": 50 })).unwrap()];
        assert_eq!(resolve_control_by_label(&pairs, "On"), None);
    }

    #[test]
    fn run_event_by_id_only() {
        let target = parse_run_event_args(&json!({ "event_id": 5 })).unwrap();
        assert_eq!(target, RunEventTarget::ById(5));
    }

    #[test]
    fn run_event_by_group_and_name() {
        let target =
            parse_run_event_args(&json!({ "group": "Lighting", "name": "Outside Off" })).unwrap();
        assert_eq!(
            target,
            RunEventTarget::ByName {
                group: "Lighting".into(),
                name: "Outside Off".into()
            }
        );
    }

    #[test]
    fn run_event_rejects_neither() {
        assert!(parse_run_event_args(&json!({})).is_err());
    }

    #[test]
    fn run_event_rejects_both_forms() {
        let err = parse_run_event_args(&json!({
            "event_id": 5,
            "group": "Lighting",
            "name": "Outside Off"
        }))
        .unwrap_err();
        assert!(err.contains("not both"), "{}", err);
    }

    #[test]
    fn run_event_rejects_id_plus_partial_pair() {
        assert!(parse_run_event_args(&json!({ "event_id": 5, "group": "Lighting" })).is_err());
    }

    #[test]
    fn run_event_rejects_group_without_name() {
        assert!(parse_run_event_args(&json!({ "group": "Lighting" })).is_err());
        assert!(parse_run_event_args(&json!({ "name": "Outside Off" })).is_err());
    }

    #[test]
    fn tool_definitions_cover_the_full_surface() {
        let names: Vec<String> = tool_definitions()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "list_all_devices",
                "get_device_info",
                "get_control",
                "control_homeseer_device",
                "control_homeseer_device_by_label",
                "get_events",
                "run_event",
            ]
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let handle = HomeSeerHandle::new(HomeSeerConfig::default());
        let result = handle_tool_call("open_garage", &json!({}), &handle).await;
        assert!(result.is_error);
        assert_eq!(
            result.content[0]["text"].as_str().unwrap(),
            "Unknown tool: open_garage"
        );
    }

    #[tokio::test]
    async fn missing_required_parameter_is_an_error_result() {
        let handle = HomeSeerHandle::new(HomeSeerConfig::default());
        let result = handle_tool_call("get_device_info", &json!({}), &handle).await;
        assert!(result.is_error);
        assert!(result.content[0]["text"]
            .as_str()
            .unwrap()
            .contains("device_ref"));
    }

    #[tokio::test]
    async fn run_event_invalid_args_do_not_reach_the_network() {
        let handle = HomeSeerHandle::new(HomeSeerConfig::default());
        let result = handle_tool_call("run_event", &json!({ "group": "Lighting" }), &handle).await;
        assert!(result.is_error);
        assert!(result.content[0]["text"]
            .as_str()
            .unwrap()
            .contains("event_id"));
    }
}
