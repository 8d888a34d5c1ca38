//! Telemetry frame extraction from a TCP byte stream.
//!
//! Frames carry no length prefix. The decoder scans for the magic header and
//! validates the trailing checksum; on any mismatch it moves forward a single
//! byte and tries again, so a corrupted candidate never hides a valid frame
//! that starts inside it.

use bytes::{Buf, BytesMut};

use super::checksum::has_valid_checksum;
use super::response::ipv4_at;
use super::{FRAME_HEADER, FRAME_LEN};
use crate::types::TelemetryFrame;

/// Extract every complete, checksum-valid frame from `buffer`.
///
/// Returns the decoded frames in stream order and the unconsumed tail, which
/// the caller keeps and prepends to the next read.
pub fn try_parse_frames(buffer: &[u8]) -> (Vec<TelemetryFrame>, &[u8]) {
    let (frames, consumed) = scan(buffer);
    (frames, &buffer[consumed..])
}

fn scan(buffer: &[u8]) -> (Vec<TelemetryFrame>, usize) {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset + FRAME_LEN <= buffer.len() {
        let candidate = &buffer[offset..offset + FRAME_LEN];

        if candidate[..FRAME_HEADER.len()] != FRAME_HEADER || !has_valid_checksum(candidate) {
            offset += 1;
            continue;
        }

        frames.push(decode_frame(candidate));
        offset += FRAME_LEN;
    }

    (frames, offset)
}

/// Decode a frame whose header and checksum were already validated.
fn decode_frame(frame: &[u8]) -> TelemetryFrame {
    let triple = |at: usize| [frame[at], frame[at + 1], frame[at + 2]];

    TelemetryFrame {
        device_ip: ipv4_at(frame, 5),
        subnet: ipv4_at(frame, 9),
        gateway: ipv4_at(frame, 13),
        server_ip: ipv4_at(frame, 17),
        server_port: u16::from_be_bytes([frame[21], frame[22]]),
        sensor_nc_no: triple(23),
        sensor_enable: triple(26),
        sensor_check_time: triple(29),
        sensor_status: triple(32),
        raw: frame.to_vec(),
    }
}

/// Per-connection accumulator around [`try_parse_frames`].
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk read from the socket and return the frames it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<TelemetryFrame> {
        self.buf.extend_from_slice(chunk);
        let (frames, consumed) = scan(&self.buf);
        self.buf.advance(consumed);
        frames
    }

    /// Bytes held back waiting for more data.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
