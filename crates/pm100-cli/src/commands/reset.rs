//! Reset command implementation.

use pm100_core::config::DiscoveryConfig;
use pm100_core::discovery::DiscoveryScanner;

use super::collect_send_log;
use crate::cli::ResetArgs;
use crate::error::CliError;
use crate::output::get_formatter;

/// Run the reset command
pub async fn run_reset(
    args: ResetArgs,
    config: DiscoveryConfig,
    json: bool,
) -> Result<(), CliError> {
    let formatter = get_formatter(json);
    let (mut scanner, mut events) = DiscoveryScanner::new(config);

    let sent = scanner.send_reset(&args.ip, &args.hw_address)?;
    let log = collect_send_log(&mut events).await;
    scanner.stop();

    println!(
        "{}",
        formatter.format_command_result(&args.ip, "reset", sent, &log)
    );

    if !sent {
        return Err(CliError::Network("reset was not sent".to_string()));
    }
    Ok(())
}
