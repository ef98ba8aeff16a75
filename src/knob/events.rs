//! Semantic knob events and their one-byte wire codes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Rotation direction reported by the quadrature decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

/// Kind of an outbound message, carried as a single ASCII byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    /// Counter-clockwise detent
    RotateLeft = b'L',
    /// Clockwise detent
    RotateRight = b'R',
    /// Button rising edge
    Click = b'C',
}

impl EventKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'L' => Some(EventKind::RotateLeft),
            b'R' => Some(EventKind::RotateRight),
            b'C' => Some(EventKind::Click),
            _ => None,
        }
    }
}

impl From<Direction> for EventKind {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Left => EventKind::RotateLeft,
            Direction::Right => EventKind::RotateRight,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code() as char)
    }
}

// One full detent, with the decoder's absolute counter after the step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationEvent {
    pub direction: Direction,
    pub absolute_value: i32,
}

// Rising edge on the button line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub raw_value: i32,
}

/// Everything the input source can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnobEvent {
    Rotation(RotationEvent),
    Button(ButtonEvent),
}

impl KnobEvent {
    pub fn rotation(direction: Direction, absolute_value: i32) -> Self {
        KnobEvent::Rotation(RotationEvent {
            direction,
            absolute_value,
        })
    }

    pub fn button(raw_value: i32) -> Self {
        KnobEvent::Button(ButtonEvent { raw_value })
    }

    pub fn stamped(self, at: Instant) -> StampedEvent {
        StampedEvent { event: self, at }
    }
}

/// Event plus the monotonic instant its edge was read off the GPIO lines.
///
/// Latency is measured between these instants, so time spent queued
/// between stages does not leak into the reported lapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampedEvent {
    pub event: KnobEvent,
    pub at: Instant,
}
