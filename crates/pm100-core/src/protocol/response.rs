//! Discovery response parsing.

use std::fmt::Write;
use std::net::{Ipv4Addr, SocketAddr};

use super::{RESPONSE_MIN_LEN, RESPONSE_TAG};
use crate::types::{DeviceInfo, HardwareAddress};

/// Fixed-offset view of a discovery response datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryResponse {
    pub hw_address: HardwareAddress,
    pub opcode: u8,
    pub firmware: [u8; 2],
    pub device_ip: Ipv4Addr,
    pub server_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub server_port: u16,
    pub active: u8,
    pub mode: u8,
    pub auth: u8,
    pub tamper: u8,
}

impl DiscoveryResponse {
    /// Firmware version as `major.minor`.
    pub fn firmware_version(&self) -> String {
        format!("{}.{}", self.firmware[0], self.firmware[1])
    }

    /// Turn the parsed response into the event payload for `from`.
    pub fn into_device_info(self, from: SocketAddr, raw: &[u8]) -> DeviceInfo {
        DeviceInfo {
            from: from.to_string(),
            size: raw.len(),
            firmware_version: self.firmware_version(),
            hw_address: self.hw_address,
            device_ip: self.device_ip,
            server_ip: self.server_ip,
            subnet_mask: self.subnet_mask,
            gateway: self.gateway,
            server_port: self.server_port,
            opcode: self.opcode,
            active: self.active,
            mode: self.mode,
            auth: self.auth,
            tamper: self.tamper,
            raw: raw.to_vec(),
        }
    }
}

/// Decode a discovery response.
///
/// Returns `None` for anything that is not ours (too short, wrong tag).
/// Bytes past the 46th are ignored.
pub fn decode_discovery_response(data: &[u8]) -> Option<DiscoveryResponse> {
    if data.len() < RESPONSE_MIN_LEN || &data[..6] != RESPONSE_TAG {
        return None;
    }

    let mut hw = [0u8; 6];
    hw.copy_from_slice(&data[6..12]);

    Some(DiscoveryResponse {
        hw_address: HardwareAddress(hw),
        opcode: data[12],
        firmware: [data[13], data[14]],
        device_ip: ipv4_at(data, 15),
        server_ip: ipv4_at(data, 19),
        // 23..27 reserved
        subnet_mask: ipv4_at(data, 27),
        gateway: ipv4_at(data, 31),
        server_port: u16::from_be_bytes([data[35], data[36]]),
        // 37..39 reserved
        active: data[39],
        mode: data[40],
        auth: data[41],
        tamper: data[42],
    })
}

pub(crate) fn ipv4_at(data: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    )
}

/// Lower-case hex octets separated by single spaces.
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, b) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A well-formed 46-byte response as a PM100 sends it.
    pub(crate) fn sample_response() -> Vec<u8> {
        let mut msg = Vec::with_capacity(46);
        msg.extend_from_slice(b"CG_RES");
        msg.extend_from_slice(&[0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0x5E]);
        msg.push(0x01);
        msg.extend_from_slice(&[2, 7]);
        msg.extend_from_slice(&[192, 168, 1, 50]);
        msg.extend_from_slice(&[192, 168, 1, 100]);
        msg.extend_from_slice(&[0, 0, 0, 0]);
        msg.extend_from_slice(&[255, 255, 255, 0]);
        msg.extend_from_slice(&[192, 168, 1, 1]);
        msg.extend_from_slice(&9002u16.to_be_bytes());
        msg.extend_from_slice(&[0, 0]);
        msg.extend_from_slice(&[1, 2, 0, 1]);
        msg.extend_from_slice(&[0, 0, 0]);
        assert_eq!(msg.len(), 46);
        msg
    }

    #[test]
    fn test_decode_response() {
        let resp = decode_discovery_response(&sample_response()).unwrap();

        assert_eq!(resp.hw_address.to_string(), "00:1A:2B:3C:4D:5E");
        assert_eq!(resp.opcode, 0x01);
        assert_eq!(resp.firmware_version(), "2.7");
        assert_eq!(resp.device_ip, Ipv4Addr::new(192, 168, 1, 50));
        assert_eq!(resp.server_ip, Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(resp.subnet_mask, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(resp.gateway, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(resp.server_port, 9002);
        assert_eq!((resp.active, resp.mode, resp.auth, resp.tamper), (1, 2, 0, 1));
    }

    #[test]
    fn test_decode_short_datagrams() {
        let full = sample_response();
        for len in 0..RESPONSE_MIN_LEN {
            assert!(decode_discovery_response(&full[..len]).is_none(), "len={}", len);
        }
    }

    #[test]
    fn test_decode_wrong_tag() {
        let mut msg = sample_response();
        msg[..6].copy_from_slice(b"CG_CMD");
        assert!(decode_discovery_response(&msg).is_none());
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut msg = sample_response();
        msg.extend_from_slice(&[0xFF; 10]);
        assert_eq!(
            decode_discovery_response(&msg),
            decode_discovery_response(&sample_response())
        );
    }

    #[test]
    fn test_into_device_info() {
        let raw = sample_response();
        let from: SocketAddr = "192.168.1.50:1500".parse().unwrap();
        let info = decode_discovery_response(&raw)
            .unwrap()
            .into_device_info(from, &raw);

        assert_eq!(info.from, "192.168.1.50:1500");
        assert_eq!(info.size, 46);
        assert_eq!(info.firmware_version, "2.7");
        assert_eq!(info.raw, raw);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["hwAddress"], "00:1A:2B:3C:4D:5E");
        assert_eq!(json["deviceIp"], "192.168.1.50");
        assert_eq!(json["serverPort"], 9002);
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[]), "");
        assert_eq!(hex_dump(&[0x00, 0xAB, 0x7f]), "00 ab 7f");
    }
}
