//! Update-config command implementation.

use std::net::Ipv4Addr;

use pm100_core::config::DiscoveryConfig;
use pm100_core::discovery::DiscoveryScanner;
use pm100_core::types::UpdateConfigRequest;

use super::collect_send_log;
use crate::cli::UpdateArgs;
use crate::error::CliError;
use crate::output::get_formatter;

/// Subnet masks the device firmware accepts.
pub const ALLOWED_MASKS: [Ipv4Addr; 3] = [
    Ipv4Addr::new(255, 0, 0, 0),
    Ipv4Addr::new(255, 255, 0, 0),
    Ipv4Addr::new(255, 255, 255, 0),
];

/// Run the update command
pub async fn run_update(
    args: UpdateArgs,
    config: DiscoveryConfig,
    json: bool,
) -> Result<(), CliError> {
    let formatter = get_formatter(json);
    validate_mask(&args.mask)?;

    let request = UpdateConfigRequest {
        hw_address: args.hw_address,
        device_ip: args.ip,
        subnet_mask: args.mask,
        gateway: args.gateway,
        server_ip: args.server_ip,
        server_port: args.server_port,
    };

    let (mut scanner, mut events) = DiscoveryScanner::new(config);
    let sent = scanner.send_update_config(&request)?;
    let log = collect_send_log(&mut events).await;
    scanner.stop();

    println!(
        "{}",
        formatter.format_command_result(&request.device_ip, "update", sent, &log)
    );

    if !sent {
        return Err(CliError::Network("update was not sent".to_string()));
    }
    Ok(())
}

fn validate_mask(mask: &str) -> Result<Ipv4Addr, CliError> {
    let parsed: Ipv4Addr = mask
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidArgument(format!("Invalid subnet mask: {}", mask)))?;

    if !ALLOWED_MASKS.contains(&parsed) {
        let allowed: Vec<String> = ALLOWED_MASKS.iter().map(|m| m.to_string()).collect();
        return Err(CliError::InvalidArgument(format!(
            "Subnet mask {} not supported (use one of {})",
            parsed,
            allowed.join(", ")
        )));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_masks() {
        for mask in ["255.0.0.0", "255.255.0.0", "255.255.255.0", " 255.255.255.0 "] {
            assert!(validate_mask(mask).is_ok(), "rejected {}", mask);
        }
    }

    #[test]
    fn test_rejected_masks() {
        for mask in ["255.255.255.128", "255.255.255.255", "0.0.0.0", "255.255.255", "mask"] {
            assert!(
                matches!(validate_mask(mask), Err(CliError::InvalidArgument(_))),
                "accepted {}",
                mask
            );
        }
    }
}
