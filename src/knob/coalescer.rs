use tracing::debug;

use super::events::{EventKind, KnobEvent};

/// Last accepted encoder position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderState {
    pub last_counter: i32,
}

/// Accepted event ready for timestamping and encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forwarded {
    pub kind: EventKind,
    pub value: i32,
}

/// Drops rotation notifications that do not move the counter.
///
/// Button edges always pass. The input driver already debounces them.
#[derive(Debug, Default)]
pub struct EventCoalescer {
    state: EncoderState,
}

impl EventCoalescer {
    pub fn new(state: EncoderState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &EncoderState {
        &self.state
    }

    pub fn filter(&mut self, event: KnobEvent) -> Option<Forwarded> {
        match event {
            KnobEvent::Rotation(rotation) => {
                if rotation.absolute_value == self.state.last_counter {
                    debug!(
                        "Ignoring repeated position {} ({:?})",
                        rotation.absolute_value, rotation.direction
                    );
                    return None;
                }
                self.state.last_counter = rotation.absolute_value;
                Some(Forwarded {
                    kind: rotation.direction.into(),
                    value: rotation.absolute_value,
                })
            }
            KnobEvent::Button(button) => Some(Forwarded {
                kind: EventKind::Click,
                value: button.raw_value,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knob::events::Direction;

    #[test]
    fn changed_position_is_forwarded() {
        let mut coalescer = EventCoalescer::default();
        let out = coalescer.filter(KnobEvent::rotation(Direction::Right, 1));
        assert_eq!(
            out,
            Some(Forwarded {
                kind: EventKind::RotateRight,
                value: 1
            })
        );
        assert_eq!(coalescer.state().last_counter, 1);
    }

    #[test]
    fn repeated_position_is_dropped() {
        let mut coalescer = EventCoalescer::new(EncoderState { last_counter: 4 });
        assert_eq!(coalescer.filter(KnobEvent::rotation(Direction::Left, 4)), None);
        assert_eq!(coalescer.state().last_counter, 4);
    }

    #[test]
    fn initial_zero_counts_as_seen() {
        let mut coalescer = EventCoalescer::default();
        assert_eq!(coalescer.filter(KnobEvent::rotation(Direction::Left, 0)), None);
    }

    #[test]
    fn button_passes_and_keeps_counter() {
        let mut coalescer = EventCoalescer::new(EncoderState { last_counter: 7 });
        for _ in 0..3 {
            assert_eq!(
                coalescer.filter(KnobEvent::button(1)),
                Some(Forwarded {
                    kind: EventKind::Click,
                    value: 1
                })
            );
        }
        assert_eq!(coalescer.state().last_counter, 7);
    }
}
