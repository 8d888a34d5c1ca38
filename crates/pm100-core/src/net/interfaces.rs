//! Interface enumeration and broadcast target computation.
//!
//! Interfaces are queried live on every call; nothing is cached.

use std::net::Ipv4Addr;

use if_addrs::{get_if_addrs, IfAddr};
use serde::Serialize;
use tracing::warn;

/// Mask used to derive discovery broadcast targets (`/24`).
pub const SEARCH_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// An IPv4 address assigned to a local interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceAddress {
    pub name: String,
    pub address: Ipv4Addr,
    pub is_loopback: bool,
}

/// All IPv4 interface addresses, loopback included.
pub fn interface_addresses() -> std::io::Result<Vec<InterfaceAddress>> {
    let mut out = Vec::new();
    for iface in get_if_addrs()? {
        let IfAddr::V4(v4) = iface.addr else {
            continue;
        };
        out.push(InterfaceAddress {
            is_loopback: v4.ip.is_loopback(),
            name: iface.name,
            address: v4.ip,
        });
    }
    Ok(out)
}

/// Distinct non-loopback IPv4 addresses, in interface order.
///
/// Enumeration failures are logged and treated as "no interfaces".
pub fn local_ipv4_addresses() -> Vec<Ipv4Addr> {
    let addrs = match interface_addresses() {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!("Failed to enumerate network interfaces: {}", e);
            return Vec::new();
        }
    };

    let mut out: Vec<Ipv4Addr> = Vec::new();
    for a in addrs.into_iter().filter(|a| !a.is_loopback) {
        if !out.contains(&a.address) {
            out.push(a.address);
        }
    }
    out
}

/// `ip | !mask`
pub fn broadcast_address(ip: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(mask))
}

/// Broadcast targets for `mask` over the given local addresses.
///
/// Falls back to the limited broadcast address when `addrs` is empty so a
/// scan still sends something.
pub fn broadcast_targets_for(addrs: &[Ipv4Addr], mask: Ipv4Addr) -> Vec<Ipv4Addr> {
    let mut targets: Vec<Ipv4Addr> = Vec::new();
    for &ip in addrs {
        let bcast = broadcast_address(ip, mask);
        if !targets.contains(&bcast) {
            targets.push(bcast);
        }
    }

    if targets.is_empty() {
        targets.push(Ipv4Addr::BROADCAST);
    }
    targets
}

/// Broadcast targets for `mask` over the live non-loopback interfaces.
pub fn broadcast_targets(mask: Ipv4Addr) -> Vec<Ipv4Addr> {
    broadcast_targets_for(&local_ipv4_addresses(), mask)
}

/// Pick the address most likely to share a subnet with the devices.
///
/// Order: 192.168.1.x, 192.168.x.x, 10.x.x.x, 172.16.x.x, then the first.
pub fn preferred_address_from(addrs: &[Ipv4Addr]) -> Option<Ipv4Addr> {
    const PREFIXES: [&[u8]; 4] = [&[192, 168, 1], &[192, 168], &[10], &[172, 16]];

    PREFIXES
        .iter()
        .find_map(|prefix| {
            addrs
                .iter()
                .copied()
                .find(|ip| ip.octets().starts_with(prefix))
        })
        .or_else(|| addrs.first().copied())
}

/// Preferred local address, for diagnostics only.
pub fn preferred_local_address() -> Option<Ipv4Addr> {
    preferred_address_from(&local_ipv4_addresses())
}
