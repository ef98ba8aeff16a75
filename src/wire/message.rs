use std::fmt;

use crate::knob::events::EventKind;

/// Size of an encoded message in bytes
pub const MESSAGE_LEN: usize = 9;

/// Decoding errors for inbound payloads
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid message length: expected 9 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Unknown event kind byte: 0x{0:02X}")]
    UnknownKind(u8),
}

/// One outbound datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnobMessage {
    pub kind: EventKind,
    pub value: i32,
    pub lapse_ms: i32,
}

impl KnobMessage {
    pub fn new(kind: EventKind, value: i32, lapse_ms: i32) -> Self {
        Self {
            kind,
            value,
            lapse_ms,
        }
    }

    /// Encodes the message big-endian without padding. Never fails.
    pub fn encode(&self) -> [u8; MESSAGE_LEN] {
        let mut buf = [0u8; MESSAGE_LEN];
        buf[0] = self.kind.code();
        buf[1..5].copy_from_slice(&self.value.to_be_bytes());
        buf[5..9].copy_from_slice(&self.lapse_ms.to_be_bytes());
        buf
    }

    /// Parses a payload produced by [`KnobMessage::encode`]
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let buf: &[u8; MESSAGE_LEN] = buf
            .try_into()
            .map_err(|_| DecodeError::InvalidLength(buf.len()))?;

        let kind = EventKind::from_code(buf[0]).ok_or(DecodeError::UnknownKind(buf[0]))?;
        let value = i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
        let lapse_ms = i32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]);

        Ok(Self {
            kind,
            value,
            lapse_ms,
        })
    }
}

impl fmt::Display for KnobMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "['{}', {}, {}]", self.kind, self.value, self.lapse_ms)
    }
}
