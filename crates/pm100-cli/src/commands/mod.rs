//! Command implementations.

pub mod config;
pub mod interfaces;
pub mod reset;
pub mod scan;
pub mod serve;
pub mod update;

pub use config::run_config;
pub use interfaces::run_interfaces;
pub use reset::run_reset;
pub use scan::run_scan;
pub use serve::run_serve;
pub use update::run_update;

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use pm100_core::events::ScanEvent;

/// How long a command waits for the background send to report back.
const SEND_SETTLE: Duration = Duration::from_millis(300);

/// Collect the scanner's log lines until it has been quiet for a moment.
pub(crate) async fn collect_send_log(events: &mut UnboundedReceiver<ScanEvent>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(Some(event)) = timeout(SEND_SETTLE, events.recv()).await {
        if let ScanEvent::Log(line) = event {
            lines.push(line);
        }
    }
    lines
}
