//! TCP server receiving telemetry frames from provisioned devices.

mod tcp;

pub use tcp::{normalize_peer_ip, FrameServer, ServerState};
