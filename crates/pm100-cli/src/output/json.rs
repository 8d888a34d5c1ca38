//! JSON-formatted output for CLI.
//!
//! One-shot results are pretty-printed; streamed frames and status changes
//! are compact single lines (NDJSON).

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::json;

use super::{InterfaceReport, OutputFormatter};
use pm100_core::types::{DeviceInfo, RawDatagram, ServerStatus, TelemetryFrame};

pub struct JsonOutput;

impl JsonOutput {
    pub fn new() -> Self {
        Self
    }

    fn to_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    fn to_line<T: Serialize>(value: &T) -> String {
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JsonOutput {
    fn format_devices(
        &self,
        devices: &[DeviceInfo],
        raw: &[RawDatagram],
        show_raw: bool,
    ) -> String {
        let mut output = json!({
            "devices": devices,
            "count": devices.len(),
            "rawCount": raw.len(),
        });
        if show_raw {
            output["raw"] = json!(raw);
        }
        Self::to_json(&output)
    }

    fn format_frame(&self, frame: &TelemetryFrame, at: DateTime<Local>) -> String {
        Self::to_line(&json!({
            "timestamp": at.to_rfc3339(),
            "event": "frame",
            "payload": frame,
        }))
    }

    fn format_status(&self, status: &ServerStatus, at: DateTime<Local>) -> String {
        Self::to_line(&json!({
            "timestamp": at.to_rfc3339(),
            "event": "status",
            "payload": status,
        }))
    }

    fn format_interfaces(&self, report: &InterfaceReport) -> String {
        Self::to_json(report)
    }

    fn format_command_result(
        &self,
        target: &str,
        command: &str,
        success: bool,
        log: &[String],
    ) -> String {
        Self::to_json(&json!({
            "target": target,
            "command": command,
            "success": success,
            "log": log,
        }))
    }

    fn format_message(&self, message: &str) -> String {
        Self::to_json(&json!({ "message": message }))
    }
}
