//! Local interface and broadcast address resolution.

pub mod interfaces;

pub use interfaces::{
    broadcast_address, broadcast_targets, broadcast_targets_for, interface_addresses,
    local_ipv4_addresses, preferred_address_from, preferred_local_address, InterfaceAddress,
    SEARCH_MASK,
};
