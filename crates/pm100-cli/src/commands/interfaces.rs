//! Interfaces command implementation.

use pm100_core::config::DiscoveryConfig;
use pm100_core::net::{broadcast_targets_for, interface_addresses, preferred_address_from};

use crate::error::CliError;
use crate::output::{get_formatter, InterfaceReport};

/// Run the interfaces command
pub fn run_interfaces(config: &DiscoveryConfig, json: bool) -> Result<(), CliError> {
    let formatter = get_formatter(json);

    let addresses = interface_addresses()?;
    let mut local = Vec::new();
    for iface in addresses.iter().filter(|a| !a.is_loopback) {
        if !local.contains(&iface.address) {
            local.push(iface.address);
        }
    }

    let report = InterfaceReport {
        search_mask: config.search_mask,
        broadcast_targets: broadcast_targets_for(&local, config.search_mask),
        preferred: preferred_address_from(&local),
        addresses,
    };

    println!("{}", formatter.format_interfaces(&report));
    Ok(())
}
