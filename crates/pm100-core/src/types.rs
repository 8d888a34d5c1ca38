//! Shared type definitions.
//!
//! These types are serialized with serde so an embedder can forward them
//! as-is (NDJSON, IPC, ...). Field names are camelCase on the wire.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Six-byte device identifier, written as `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HardwareAddress(pub [u8; 6]);

impl HardwareAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

impl FromStr for HardwareAddress {
    type Err = FormatError;

    /// Accepts exactly six colon-separated hex octets, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FormatError::HardwareAddress(s.to_string());
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(':');

        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

impl TryFrom<String> for HardwareAddress {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HardwareAddress> for String {
    fn from(value: HardwareAddress) -> Self {
        value.to_string()
    }
}

/// A device that answered a discovery request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Sender of the datagram as `ip:port`
    pub from: String,
    /// Datagram length in bytes
    pub size: usize,
    pub hw_address: HardwareAddress,
    pub device_ip: Ipv4Addr,
    pub server_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub server_port: u16,
    /// Firmware version as `major.minor`
    pub firmware_version: String,
    /// Opcode echoed back by the device
    pub opcode: u8,
    pub active: u8,
    pub mode: u8,
    pub auth: u8,
    pub tamper: u8,
    /// Full datagram, kept so a caller can re-send fields it did not edit
    pub raw: Vec<u8>,
}

/// A datagram on the discovery port that is not a discovery response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDatagram {
    pub from: String,
    pub size: usize,
    /// Lower-case hex octets separated by single spaces
    pub hex: String,
}

/// Fixed-size status record streamed by a provisioned device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    pub device_ip: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub server_ip: Ipv4Addr,
    pub server_port: u16,
    /// Normally-closed / normally-open configuration per sensor
    pub sensor_nc_no: [u8; 3],
    pub sensor_enable: [u8; 3],
    pub sensor_check_time: [u8; 3],
    pub sensor_status: [u8; 3],
    /// The 36 bytes the frame was decoded from
    pub raw: Vec<u8>,
}

/// Network settings pushed to a device with the update-config command.
///
/// Fields are kept as caller-supplied strings; the codec validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigRequest {
    pub hw_address: String,
    pub device_ip: String,
    pub subnet_mask: String,
    pub gateway: String,
    pub server_ip: String,
    pub server_port: u32,
}

/// Snapshot of the telemetry server state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub connections: usize,
}

impl ServerStatus {
    pub fn stopped() -> Self {
        Self::default()
    }
}
