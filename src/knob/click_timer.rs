//! Latency between accepted events
//!
//! Only the monotonic clock is used so wall-clock adjustments never skew
//! the reported lapse.

use std::time::{Duration, Instant};
use tracing::debug;

/// Source of monotonic instants
pub trait MonotonicClock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl MonotonicClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTimerState {
    /// No event accepted yet
    Idle,
    /// At least one event accepted
    Armed { last_event: Instant },
}

#[derive(Debug)]
pub struct ClickTimer<C: MonotonicClock = SystemClock> {
    clock: C,
    state: ClickTimerState,
}

impl Default for ClickTimer<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: MonotonicClock> ClickTimer<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: ClickTimerState::Idle,
        }
    }

    pub fn state(&self) -> ClickTimerState {
        self.state
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Whole milliseconds since the previous call, 0 on the first call.
    ///
    /// Every call re-arms the timer at the current instant.
    pub fn lapse_ms(&mut self) -> i32 {
        self.lapse_ms_at(self.clock.now())
    }

    /// Same as [`ClickTimer::lapse_ms`] for an event observed at `now`.
    /// An instant earlier than the armed one counts as zero.
    pub fn lapse_ms_at(&mut self, now: Instant) -> i32 {
        let previous = std::mem::replace(&mut self.state, ClickTimerState::Armed { last_event: now });

        match previous {
            ClickTimerState::Idle => {
                debug!("First event, arming click timer");
                0
            }
            ClickTimerState::Armed { last_event } => {
                let lapse = to_millis(now.saturating_duration_since(last_event));
                debug!("Time between events: {} ms", lapse);
                lapse
            }
        }
    }
}

// Truncates toward zero, saturating for lapses beyond the i32 range
fn to_millis(lapse: Duration) -> i32 {
    i32::try_from(lapse.as_nanos() / 1_000_000).unwrap_or(i32::MAX)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Clock that only moves when told to
    #[derive(Debug, Clone)]
    pub(crate) struct ManualClock {
        now: Rc<Cell<Instant>>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self {
                now: Rc::new(Cell::new(Instant::now())),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl MonotonicClock for ManualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }

    #[test]
    fn first_call_is_zero_and_arms() {
        let clock = ManualClock::new();
        let mut timer = ClickTimer::new(clock.clone());
        assert_eq!(timer.state(), ClickTimerState::Idle);
        clock.advance(Duration::from_secs(3));
        assert_eq!(timer.lapse_ms(), 0);
        assert!(matches!(timer.state(), ClickTimerState::Armed { .. }));
    }

    #[test]
    fn lapse_truncates_sub_millisecond_part() {
        let clock = ManualClock::new();
        let mut timer = ClickTimer::new(clock.clone());
        timer.lapse_ms();
        clock.advance(Duration::from_nanos(49_999_999));
        assert_eq!(timer.lapse_ms(), 49);
        clock.advance(Duration::from_nanos(999_999));
        assert_eq!(timer.lapse_ms(), 0);
    }

    #[test]
    fn lapse_is_measured_from_previous_call() {
        let clock = ManualClock::new();
        let mut timer = ClickTimer::new(clock.clone());
        timer.lapse_ms();
        clock.advance(Duration::from_millis(50));
        assert_eq!(timer.lapse_ms(), 50);
        clock.advance(Duration::from_millis(120));
        assert_eq!(timer.lapse_ms(), 120);
    }

    #[test]
    fn simultaneous_events_report_zero() {
        let clock = ManualClock::new();
        let mut timer = ClickTimer::new(clock);
        timer.lapse_ms();
        assert_eq!(timer.lapse_ms(), 0);
    }

    #[test]
    fn lapse_follows_event_instants_not_the_clock() {
        let clock = ManualClock::new();
        let start = clock.now();
        let mut timer = ClickTimer::new(clock.clone());
        assert_eq!(timer.lapse_ms_at(start), 0);

        // Handled late: the clock has run ahead of the edge
        clock.advance(Duration::from_millis(500));
        assert_eq!(timer.lapse_ms_at(start + Duration::from_millis(40)), 40);
        assert_eq!(
            timer.state(),
            ClickTimerState::Armed {
                last_event: start + Duration::from_millis(40)
            }
        );
    }

    #[test]
    fn earlier_instant_counts_as_zero() {
        let clock = ManualClock::new();
        let start = clock.now();
        let mut timer = ClickTimer::new(clock);
        timer.lapse_ms_at(start + Duration::from_millis(10));
        assert_eq!(timer.lapse_ms_at(start), 0);
    }

    #[test]
    fn huge_lapse_saturates() {
        assert_eq!(to_millis(Duration::from_secs(30 * 24 * 3600)), i32::MAX);
        assert_eq!(to_millis(Duration::from_millis(i32::MAX as u64)), i32::MAX);
    }
}
