//! Table-formatted output for CLI.

use chrono::{DateTime, Local};
use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use super::{InterfaceReport, OutputFormatter};
use pm100_core::types::{DeviceInfo, RawDatagram, ServerStatus, TelemetryFrame};

pub struct TableOutput;

impl TableOutput {
    pub fn new() -> Self {
        Self
    }

    fn triple(values: &[u8; 3]) -> String {
        format!("{} {} {}", values[0], values[1], values[2])
    }

    fn flag_cell(value: u8) -> Cell {
        if value == 0 {
            Cell::new("0")
        } else {
            Cell::new(value.to_string()).fg(Color::Yellow)
        }
    }
}

impl Default for TableOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TableOutput {
    fn format_devices(
        &self,
        devices: &[DeviceInfo],
        raw: &[RawDatagram],
        show_raw: bool,
    ) -> String {
        let mut sections = Vec::new();

        if devices.is_empty() {
            sections.push("No devices found.".to_string());
        } else {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![
                "HW Address", "Device IP", "Subnet", "Gateway", "Server", "FW", "Active", "Mode",
                "Auth", "Tamper",
            ]);

            for device in devices {
                table.add_row(vec![
                    Cell::new(device.hw_address.to_string()),
                    Cell::new(device.device_ip.to_string()),
                    Cell::new(device.subnet_mask.to_string()),
                    Cell::new(device.gateway.to_string()),
                    Cell::new(format!("{}:{}", device.server_ip, device.server_port)),
                    Cell::new(&device.firmware_version),
                    Self::flag_cell(device.active),
                    Self::flag_cell(device.mode),
                    Self::flag_cell(device.auth),
                    Self::flag_cell(device.tamper),
                ]);
            }

            sections.push(format!("{}\n\nFound {} device(s)", table, devices.len()));
        }

        if show_raw && !raw.is_empty() {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["From", "Size", "Data"]);
            for datagram in raw {
                table.add_row(vec![
                    Cell::new(&datagram.from),
                    Cell::new(datagram.size.to_string()),
                    Cell::new(&datagram.hex),
                ]);
            }
            sections.push(format!("Unrecognized datagrams:\n{}", table));
        } else if !raw.is_empty() {
            sections.push(
                format!(
                    "{} unrecognized datagram(s) ignored (use --raw to list them)",
                    raw.len()
                )
                .dimmed()
                .to_string(),
            );
        }

        sections.join("\n\n")
    }

    fn format_frame(&self, frame: &TelemetryFrame, at: DateTime<Local>) -> String {
        let status = Self::triple(&frame.sensor_status);
        let status = if frame.sensor_status.iter().any(|s| *s != 0) {
            status.yellow()
        } else {
            status.green()
        };

        format!(
            "{} {:<15} status [{}] enable [{}] nc/no [{}] check [{}] server {}:{}",
            at.format("%H:%M:%S%.3f").to_string().dimmed(),
            frame.device_ip.to_string(),
            status,
            Self::triple(&frame.sensor_enable),
            Self::triple(&frame.sensor_nc_no),
            Self::triple(&frame.sensor_check_time),
            frame.server_ip,
            frame.server_port
        )
    }

    fn format_status(&self, status: &ServerStatus, at: DateTime<Local>) -> String {
        let state = if status.running {
            "RUNNING".green()
        } else {
            "STOPPED".red()
        };

        let mut line = format!(
            "{} {} connections={}",
            at.format("%H:%M:%S%.3f").to_string().dimmed(),
            state,
            status.connections
        );
        if let (Some(host), Some(port)) = (&status.host, status.port) {
            line.push_str(&format!(" on {}:{}", host, port));
        }
        line
    }

    fn format_interfaces(&self, report: &InterfaceReport) -> String {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Interface", "Address", "Loopback", "Preferred"]);

        for iface in &report.addresses {
            let preferred = report.preferred == Some(iface.address);
            table.add_row(vec![
                Cell::new(&iface.name),
                Cell::new(iface.address.to_string()),
                Cell::new(if iface.is_loopback { "yes" } else { "" }),
                if preferred {
                    Cell::new("*").fg(Color::Green)
                } else {
                    Cell::new("")
                },
            ]);
        }

        let targets: Vec<String> = report
            .broadcast_targets
            .iter()
            .map(|t| t.to_string())
            .collect();

        format!(
            "{}\n\nBroadcast targets (mask {}): {}",
            table,
            report.search_mask,
            targets.join(", ")
        )
    }

    fn format_command_result(
        &self,
        target: &str,
        command: &str,
        success: bool,
        log: &[String],
    ) -> String {
        let status = if success {
            "[OK]".green()
        } else {
            "[FAIL]".red()
        };

        let mut lines = vec![format!("{} {} '{}'", status, target, command)];
        lines.extend(log.iter().map(|l| format!("  {}", l.dimmed())));
        lines.join("\n")
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }
}
