//! Full-detent quadrature decoder for CLK/DT encoder lines
//!
//! The two line levels form a two-bit state `CLK DT`. A detent is only
//! counted once the lines return to `00` after a transition sequence whose
//! direction was recorded on the way out, so contact bounce around a single
//! position never produces a count.

use tracing::debug;

use super::events::{Direction, RotationEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Rest,      // 00
    DataHigh,  // 01
    ClockHigh, // 10
    BothHigh,  // 11
}

impl LineState {
    fn from_levels(clk: bool, dt: bool) -> Self {
        match (clk, dt) {
            (false, false) => LineState::Rest,
            (false, true) => LineState::DataHigh,
            (true, false) => LineState::ClockHigh,
            (true, true) => LineState::BothHigh,
        }
    }
}

#[derive(Debug)]
pub struct QuadratureDecoder {
    clk: bool,
    dt: bool,
    state: LineState,
    direction: Option<Direction>,
    counter: i32,
}

impl Default for QuadratureDecoder {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl QuadratureDecoder {
    /// Starts from the given line levels with the counter at zero
    pub fn new(clk: bool, dt: bool) -> Self {
        Self {
            clk,
            dt,
            state: LineState::from_levels(clk, dt),
            direction: None,
            counter: 0,
        }
    }

    pub fn counter(&self) -> i32 {
        self.counter
    }

    pub fn clock_changed(&mut self, level: bool) -> Option<RotationEvent> {
        self.clk = level;
        self.step()
    }

    pub fn data_changed(&mut self, level: bool) -> Option<RotationEvent> {
        self.dt = level;
        self.step()
    }

    fn step(&mut self) -> Option<RotationEvent> {
        let next = LineState::from_levels(self.clk, self.dt);
        let mut detent = None;

        match (self.state, next) {
            (LineState::Rest, LineState::DataHigh) => self.direction = Some(Direction::Right),
            (LineState::Rest, LineState::ClockHigh) => self.direction = Some(Direction::Left),

            (LineState::DataHigh, LineState::BothHigh) => self.direction = Some(Direction::Right),
            (LineState::DataHigh, LineState::Rest) => {
                if self.direction == Some(Direction::Left) {
                    detent = Some(Direction::Left);
                }
            }

            (LineState::ClockHigh, LineState::BothHigh) => self.direction = Some(Direction::Left),
            (LineState::ClockHigh, LineState::Rest) => {
                if self.direction == Some(Direction::Right) {
                    detent = Some(Direction::Right);
                }
            }

            (LineState::BothHigh, LineState::DataHigh) => self.direction = Some(Direction::Left),
            (LineState::BothHigh, LineState::ClockHigh) => self.direction = Some(Direction::Right),
            // Skipped an intermediate state, the recorded direction still completes the turn
            (LineState::BothHigh, LineState::Rest) => detent = self.direction,

            _ => {}
        }

        self.state = next;

        detent.map(|direction| {
            self.counter = match direction {
                Direction::Left => self.counter.wrapping_sub(1),
                Direction::Right => self.counter.wrapping_add(1),
            };
            debug!("Detent {:?}, counter now {}", direction, self.counter);
            RotationEvent {
                direction,
                absolute_value: self.counter,
            }
        })
    }
}
