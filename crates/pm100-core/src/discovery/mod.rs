//! UDP device discovery and command module.
//!
//! Provides the discovery scanner and the reusable broadcast socket it binds.

pub mod scanner;
pub mod socket;

pub use scanner::DiscoveryScanner;
pub use socket::create_reusable_socket;
