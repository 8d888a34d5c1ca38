//! Scan command implementation.

use std::time::Duration;

use pm100_core::config::DiscoveryConfig;
use pm100_core::discovery::DiscoveryScanner;
use pm100_core::events::ScanEvent;
use pm100_core::types::DeviceInfo;
use tokio::time::sleep;

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output::get_formatter;

/// Run the scan command
pub async fn run_scan(
    args: ScanArgs,
    mut config: DiscoveryConfig,
    json: bool,
) -> Result<(), CliError> {
    let formatter = get_formatter(json);

    if !args.target.is_empty() {
        config.targets = args.target.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    let (mut scanner, mut events) = DiscoveryScanner::new(config);

    if !json {
        println!("Scanning for {} seconds...", args.duration);
    }

    if !scanner.start() {
        return Err(CliError::Network(format!(
            "could not open the discovery socket on port {}",
            scanner.config().port
        )));
    }

    let deadline = sleep(Duration::from_secs(args.duration));
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut devices: Vec<DeviceInfo> = Vec::new();
    let mut raw = Vec::new();

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Some(ScanEvent::Device(info)) => upsert_device(&mut devices, info),
                Some(ScanEvent::Raw(datagram)) => raw.push(datagram),
                Some(ScanEvent::Log(_)) => {}
                None => break,
            },
        }
    }

    scanner.stop();

    devices.sort_by_key(|d| d.device_ip);
    println!("{}", formatter.format_devices(&devices, &raw, args.raw));

    if devices.is_empty() {
        return Err(CliError::NoDevicesFound);
    }

    Ok(())
}

/// Keep one entry per hardware address; later answers replace earlier ones.
fn upsert_device(devices: &mut Vec<DeviceInfo>, info: DeviceInfo) {
    match devices.iter_mut().find(|d| d.hw_address == info.hw_address) {
        Some(existing) => *existing = info,
        None => devices.push(info),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pm100_core::types::HardwareAddress;
    use std::net::Ipv4Addr;

    fn device(hw: u8, ip: [u8; 4]) -> DeviceInfo {
        DeviceInfo {
            from: format!("{}:1500", Ipv4Addr::from(ip)),
            size: 46,
            hw_address: HardwareAddress([0, 0, 0, 0, 0, hw]),
            device_ip: Ipv4Addr::from(ip),
            server_ip: Ipv4Addr::new(192, 168, 1, 100),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            server_port: 9002,
            firmware_version: "1.0".to_string(),
            opcode: 1,
            active: 1,
            mode: 0,
            auth: 0,
            tamper: 0,
            raw: Vec::new(),
        }
    }

    #[test]
    fn test_upsert_replaces_same_device() {
        let mut devices = Vec::new();
        upsert_device(&mut devices, device(1, [192, 168, 1, 10]));
        upsert_device(&mut devices, device(2, [192, 168, 1, 11]));
        // Five resends mean the same device answers several times.
        upsert_device(&mut devices, device(1, [192, 168, 1, 12]));

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_ip, Ipv4Addr::new(192, 168, 1, 12));
    }
}
