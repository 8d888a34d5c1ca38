//! CLI argument definitions using clap.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// PM100 CLI - discover, provision and monitor PM100 controllers
#[derive(Parser, Debug)]
#[command(name = "pm100-cli")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "PM100_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Broadcast a discovery request and list the devices that answer
    Scan(ScanArgs),

    /// Reset a device to factory settings
    Reset(ResetArgs),

    /// Push network settings to a device
    Update(UpdateArgs),

    /// Run the telemetry server until Ctrl+C
    Serve(ServeArgs),

    /// Show local IPv4 addresses and the broadcast targets derived from them
    Interfaces,

    /// Manage the CLI config file
    Config(ConfigArgs),
}

// ==================== Scan ====================

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// How long to listen for answers, in seconds
    #[arg(short, long, default_value = "10")]
    pub duration: u64,

    /// Send to this address instead of the interface broadcasts (repeatable)
    #[arg(short, long)]
    pub target: Vec<Ipv4Addr>,

    /// Discovery port
    #[arg(long)]
    pub port: Option<u16>,

    /// Also list datagrams that were not discovery responses
    #[arg(long)]
    pub raw: bool,
}

// ==================== Reset ====================

#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Current device IP address
    pub ip: String,

    /// Device hardware address (AA:BB:CC:DD:EE:FF)
    pub hw_address: String,
}

// ==================== Update ====================

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Device hardware address (AA:BB:CC:DD:EE:FF)
    pub hw_address: String,

    /// New device IP address
    #[arg(long)]
    pub ip: String,

    /// Subnet mask (255.0.0.0, 255.255.0.0 or 255.255.255.0)
    #[arg(long, default_value = "255.255.255.0")]
    pub mask: String,

    /// Default gateway
    #[arg(long)]
    pub gateway: String,

    /// Telemetry server IP the device should connect to
    #[arg(long)]
    pub server_ip: String,

    /// Telemetry server port
    #[arg(long, default_value = "9002")]
    pub server_port: u32,
}

// ==================== Serve ====================

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen port (defaults to the config file value)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind address (defaults to the config file value)
    #[arg(long)]
    pub host: Option<String>,
}

// ==================== Config ====================

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the config file location
    Path,

    /// Print the effective configuration
    Show,

    /// Write a config file with default values
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_targets() {
        let cli = Cli::try_parse_from([
            "pm100-cli", "scan", "-d", "3", "-t", "10.0.0.255", "-t", "192.168.1.255", "--json",
        ])
        .unwrap();

        assert!(cli.json);
        let Commands::Scan(args) = cli.command else {
            panic!("expected scan");
        };
        assert_eq!(args.duration, 3);
        assert_eq!(
            args.target,
            vec![Ipv4Addr::new(10, 0, 0, 255), Ipv4Addr::new(192, 168, 1, 255)]
        );
    }

    #[test]
    fn test_parse_update_defaults() {
        let cli = Cli::try_parse_from([
            "pm100-cli",
            "update",
            "00:11:22:33:44:55",
            "--ip",
            "192.168.1.50",
            "--gateway",
            "192.168.1.1",
            "--server-ip",
            "192.168.1.100",
        ])
        .unwrap();

        let Commands::Update(args) = cli.command else {
            panic!("expected update");
        };
        assert_eq!(args.mask, "255.255.255.0");
        assert_eq!(args.server_port, 9002);
    }
}
