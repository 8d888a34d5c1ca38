//! Packet builders for host-to-device datagrams.
//!
//! These are sent over UDP to the discovery port, either broadcast or
//! directly to a device.

use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};

use super::checksum::xor_checksum;
use super::{COMMAND_TAG, OPCODE_UPDATE_CONFIG, RESET_MAGIC};
use crate::error::FormatError;
use crate::types::{HardwareAddress, UpdateConfigRequest};

/// Build the 13-byte discovery request: tag, six zero bytes, checksum.
pub fn encode_discovery_request() -> Bytes {
    let mut buf = BytesMut::with_capacity(13);
    buf.put_slice(COMMAND_TAG);
    buf.put_bytes(0, 6);
    let cs = xor_checksum(&buf);
    buf.put_u8(cs);
    buf.freeze()
}

/// Build a reset command: hardware address followed by the reset magic.
///
/// The reset packet carries no checksum.
pub fn encode_reset(hw_address: &str) -> Result<Bytes, FormatError> {
    let hw: HardwareAddress = hw_address.parse()?;

    let mut buf = BytesMut::with_capacity(6 + RESET_MAGIC.len());
    buf.put_slice(&hw.octets());
    buf.put_slice(RESET_MAGIC);
    Ok(buf.freeze())
}

/// Build an update-config command.
///
/// Layout: tag(6) hw(6) opcode(1) device ip(4) mask(4) gateway(4)
/// server ip(4) server port BE(2) checksum(1).
///
/// The subnet mask is only checked for IPv4 syntax; restricting it to a set
/// of allowed masks is up to the caller.
pub fn encode_update_config(request: &UpdateConfigRequest) -> Result<Bytes, FormatError> {
    let hw: HardwareAddress = request.hw_address.parse()?;
    let device_ip = parse_ipv4("device IP", &request.device_ip)?;
    let subnet_mask = parse_ipv4("subnet mask", &request.subnet_mask)?;
    let gateway = parse_ipv4("gateway", &request.gateway)?;
    let server_ip = parse_ipv4("server IP", &request.server_ip)?;
    let server_port = parse_port(request.server_port)?;

    let mut buf = BytesMut::with_capacity(32);
    buf.put_slice(COMMAND_TAG);
    buf.put_slice(&hw.octets());
    buf.put_u8(OPCODE_UPDATE_CONFIG);
    buf.put_slice(&device_ip.octets());
    buf.put_slice(&subnet_mask.octets());
    buf.put_slice(&gateway.octets());
    buf.put_slice(&server_ip.octets());
    buf.put_u16(server_port);
    let cs = xor_checksum(&buf);
    buf.put_u8(cs);
    Ok(buf.freeze())
}

/// Parse a dotted-quad IPv4 string, naming the field on failure.
pub fn parse_ipv4(field: &'static str, value: &str) -> Result<Ipv4Addr, FormatError> {
    value.trim().parse().map_err(|_| FormatError::Ipv4 {
        field,
        value: value.to_string(),
    })
}

fn parse_port(port: u32) -> Result<u16, FormatError> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(FormatError::Port(port)),
    }
}
