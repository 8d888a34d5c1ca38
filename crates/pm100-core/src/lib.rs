//! Shared core library for PM100 controllers.
//!
//! Discovers devices over UDP broadcast, pushes network settings and resets
//! to them, and runs the TCP server that receives their telemetry frames.
//! Components report through event channels rather than callbacks; see
//! [`events`].

pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod net;
pub mod protocol;
pub mod server;
pub mod types;

pub use config::{default_config_path, CoreConfig, DiscoveryConfig, ServerConfig};
pub use discovery::DiscoveryScanner;
pub use error::{ConfigError, CoreError, FormatError, Result};
pub use events::{ScanEvent, ServerEvent};
pub use server::{FrameServer, ServerState};
pub use types::{
    DeviceInfo, HardwareAddress, RawDatagram, ServerStatus, TelemetryFrame, UpdateConfigRequest,
};
