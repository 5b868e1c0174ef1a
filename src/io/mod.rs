// src/io/mod.rs
//
// Transport layer: the SocketCAN driver, the MQTT client and the frame type
// they exchange with the bridge core.

mod error;
pub mod mqtt;
pub mod socketcan;
mod types;

pub use error::{IoError, IoErrorKind};
pub use types::{CanEvent, TransmitRequest, TransmitSender};

use crate::table::{MAX_STANDARD_ID, PAYLOAD_LEN};

// ============================================================================
// CAN Frame
// ============================================================================

/// A classic CAN data frame as seen by the bridge
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanMessage {
    /// Arbitration ID (11 or 29 bit)
    pub id: u32,
    /// Extended (29-bit) frame format
    pub extended: bool,
    /// Frame data, at most 8 bytes
    pub data: Vec<u8>,
}

impl CanMessage {
    /// Build a frame, choosing the extended format when the ID does not fit 11 bits.
    pub fn new(id: u32, data: &[u8]) -> Self {
        let len = data.len().min(PAYLOAD_LEN);
        Self {
            id,
            extended: id > MAX_STANDARD_ID,
            data: data[..len].to_vec(),
        }
    }

    /// Data as uppercase hex, for logging
    pub fn hex_data(&self) -> String {
        hex::encode_upper(&self.data)
    }
}

/// Copy up to 8 bytes into a zero-padded payload.
pub fn pad_payload(bytes: &[u8]) -> [u8; PAYLOAD_LEN] {
    let mut out = [0u8; PAYLOAD_LEN];
    let n = bytes.len().min(PAYLOAD_LEN);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_format_follows_id() {
        assert!(!CanMessage::new(0x51E, &[1]).extended);
        assert!(!CanMessage::new(0x7FF, &[1]).extended);
        assert!(CanMessage::new(0x800, &[1]).extended);
        assert!(CanMessage::new(0x18FF_0001, &[1]).extended);
    }

    #[test]
    fn test_data_is_capped_and_hex_formatted() {
        let msg = CanMessage::new(0x100, &[0xAB; 10]);
        assert_eq!(msg.data.len(), 8);
        assert_eq!(CanMessage::new(0x100, &[0x01, 0xfd]).hex_data(), "01FD");
    }

    #[test]
    fn test_pad_payload() {
        assert_eq!(pad_payload(&[1, 2, 3]), [1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(pad_payload(&[9; 12]), [9; 8]);
        assert_eq!(pad_payload(&[]), [0; 8]);
    }
}
