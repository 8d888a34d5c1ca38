//! Output formatting for CLI results.

pub mod json;
pub mod table;

pub use json::JsonOutput;
pub use table::TableOutput;

use std::net::Ipv4Addr;

use chrono::{DateTime, Local};
use serde::Serialize;

use pm100_core::net::InterfaceAddress;
use pm100_core::types::{DeviceInfo, RawDatagram, ServerStatus, TelemetryFrame};

/// What `interfaces` reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceReport {
    pub addresses: Vec<InterfaceAddress>,
    pub search_mask: Ipv4Addr,
    pub broadcast_targets: Vec<Ipv4Addr>,
    pub preferred: Option<Ipv4Addr>,
}

/// Output formatter trait
pub trait OutputFormatter {
    /// Format the result of a scan
    fn format_devices(&self, devices: &[DeviceInfo], raw: &[RawDatagram], show_raw: bool)
        -> String;

    /// Format one telemetry frame as a single line
    fn format_frame(&self, frame: &TelemetryFrame, at: DateTime<Local>) -> String;

    /// Format a server status change as a single line
    fn format_status(&self, status: &ServerStatus, at: DateTime<Local>) -> String;

    /// Format the interface report
    fn format_interfaces(&self, report: &InterfaceReport) -> String;

    /// Format the result of a device command
    fn format_command_result(
        &self,
        target: &str,
        command: &str,
        success: bool,
        log: &[String],
    ) -> String;

    /// Format a generic message
    fn format_message(&self, message: &str) -> String;
}

/// Get the appropriate formatter based on JSON flag
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonOutput::new())
    } else {
        Box::new(TableOutput::new())
    }
}
