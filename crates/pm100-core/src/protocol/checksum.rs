//! XOR checksum shared by every checksummed packet.

/// XOR-fold of all bytes.
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Check that the last byte of `packet` is the XOR of everything before it.
///
/// An empty packet never validates.
pub fn has_valid_checksum(packet: &[u8]) -> bool {
    match packet.split_last() {
        Some((last, body)) => xor_checksum(body) == *last,
        None => false,
    }
}
