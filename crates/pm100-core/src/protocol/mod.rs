//! Protocol layer for device communication.
//!
//! Pure encode/decode of the binary discovery, command and telemetry
//! packets. Nothing in here performs I/O.

pub mod checksum;
pub mod commands;
pub mod frame;
pub mod response;

pub use checksum::{has_valid_checksum, xor_checksum};
pub use commands::{encode_discovery_request, encode_reset, encode_update_config, parse_ipv4};
pub use frame::{try_parse_frames, FrameDecoder};
pub use response::{decode_discovery_response, hex_dump, DiscoveryResponse};

/// UDP port devices listen and answer on.
pub const DISCOVERY_PORT: u16 = 1500;

/// Tag that opens every host-to-device datagram.
pub const COMMAND_TAG: &[u8; 6] = b"CG_CMD";

/// Tag that opens a discovery response.
pub const RESPONSE_TAG: &[u8; 6] = b"CG_RES";

/// Opcode of the update-config command. Undocumented device constant.
pub const OPCODE_UPDATE_CONFIG: u8 = 0x0E;

/// Payload that follows the hardware address in a reset command.
pub const RESET_MAGIC: &[u8] = b"Camguard_Initialize";

/// Magic header of a telemetry frame: "CGDI" followed by 0x7F.
pub const FRAME_HEADER: [u8; 5] = [0x43, 0x47, 0x44, 0x49, 0x7F];

/// Telemetry frame length including header and checksum.
pub const FRAME_LEN: usize = 36;

/// Minimum length of a discovery response.
pub const RESPONSE_MIN_LEN: usize = 46;
