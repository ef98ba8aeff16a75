use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::click_timer::{ClickTimer, MonotonicClock, SystemClock};
use super::coalescer::{EncoderState, EventCoalescer};
use super::events::{KnobEvent, StampedEvent};
use crate::wire::KnobMessage;

// Processor errors
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Failed to forward message: {0}")]
    MessageSendError(String),
}

/// Turns decoded knob events into outbound messages.
///
/// Owns all pipeline state. Events must be fed one at a time, in the order
/// the input source produced them.
#[derive(Debug)]
pub struct KnobProcessor<C: MonotonicClock = SystemClock> {
    coalescer: EventCoalescer,
    timer: ClickTimer<C>,
}

impl Default for KnobProcessor<SystemClock> {
    fn default() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: MonotonicClock> KnobProcessor<C> {
    pub fn with_clock(clock: C) -> Self {
        Self::from_parts(EventCoalescer::default(), ClickTimer::new(clock))
    }

    pub fn from_parts(coalescer: EventCoalescer, timer: ClickTimer<C>) -> Self {
        Self { coalescer, timer }
    }

    pub fn encoder_state(&self) -> &EncoderState {
        self.coalescer.state()
    }

    pub fn timer(&self) -> &ClickTimer<C> {
        &self.timer
    }

    /// Returns the message to send, or `None` for a dropped duplicate
    pub fn process(&mut self, event: KnobEvent) -> Option<KnobMessage> {
        let now = self.timer.now();
        self.process_at(event, now)
    }

    /// Like [`KnobProcessor::process`], timing the event at `at`
    pub fn process_at(&mut self, event: KnobEvent, at: Instant) -> Option<KnobMessage> {
        let forwarded = self.coalescer.filter(event)?;
        let lapse_ms = self.timer.lapse_ms_at(at);
        let message = KnobMessage::new(forwarded.kind, forwarded.value, lapse_ms);
        debug!("Built message {}", message);
        Some(message)
    }

    /// Consumes events until the input closes or the token is cancelled
    pub async fn run(
        mut self,
        mut event_receiver: mpsc::Receiver<StampedEvent>,
        message_sender: mpsc::Sender<KnobMessage>,
        shutdown: CancellationToken,
    ) -> Result<(), ProcessorError> {
        info!("Starting knob event processor");
        let mut forwarded = 0u64;

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Processor stopping, {} messages forwarded", forwarded);
                    return Ok(());
                }
                event = event_receiver.recv() => event,
            };

            let Some(event) = event else {
                warn!("Event channel closed, processor exiting");
                return Ok(());
            };

            if let Some(message) = self.process_at(event.event, event.at) {
                message_sender
                    .send(message)
                    .await
                    .map_err(|e| ProcessorError::MessageSendError(e.to_string()))?;
                forwarded += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knob::click_timer::tests::ManualClock;
    use crate::knob::click_timer::ClickTimerState;
    use crate::knob::events::{Direction, EventKind};
    use std::time::Duration;

    #[test]
    fn rotate_click_duplicate_scenario() {
        let clock = ManualClock::new();
        let mut processor = KnobProcessor::with_clock(clock.clone());

        assert_eq!(
            processor.process(KnobEvent::rotation(Direction::Right, 1)),
            Some(KnobMessage::new(EventKind::RotateRight, 1, 0))
        );

        clock.advance(Duration::from_millis(50));
        assert_eq!(
            processor.process(KnobEvent::button(1)),
            Some(KnobMessage::new(EventKind::Click, 1, 50))
        );
        assert_eq!(processor.encoder_state().last_counter, 1);

        assert_eq!(processor.process(KnobEvent::rotation(Direction::Right, 1)), None);
    }

    #[test]
    fn every_changed_position_yields_one_message() {
        let mut processor = KnobProcessor::with_clock(ManualClock::new());
        let values = [1, 2, 3, 2, 1, 0, -1, -5, 100];

        for value in values {
            let direction = if value > processor.encoder_state().last_counter {
                Direction::Right
            } else {
                Direction::Left
            };
            let message = processor.process(KnobEvent::rotation(direction, value));
            assert_eq!(message.map(|m| m.value), Some(value));
            assert_eq!(message.map(|m| m.kind), Some(EventKind::from(direction)));
        }
    }

    #[test]
    fn duplicate_does_not_touch_timer() {
        let clock = ManualClock::new();
        let mut processor = KnobProcessor::with_clock(clock.clone());
        processor.process(KnobEvent::rotation(Direction::Right, 1));
        let armed = processor.timer().state();

        clock.advance(Duration::from_millis(30));
        assert_eq!(processor.process(KnobEvent::rotation(Direction::Right, 1)), None);
        assert_eq!(processor.timer().state(), armed);

        clock.advance(Duration::from_millis(30));
        let message = processor.process(KnobEvent::rotation(Direction::Right, 2));
        assert_eq!(message.map(|m| m.lapse_ms), Some(60));
    }

    #[test]
    fn first_event_of_any_kind_has_zero_lapse() {
        let clock = ManualClock::new();
        let mut processor = KnobProcessor::with_clock(clock.clone());
        assert_eq!(processor.timer().state(), ClickTimerState::Idle);
        clock.advance(Duration::from_secs(10));
        let message = processor.process(KnobEvent::button(1));
        assert_eq!(message, Some(KnobMessage::new(EventKind::Click, 1, 0)));
    }

    #[test]
    fn preset_state_is_respected() {
        let clock = ManualClock::new();
        let mut processor = KnobProcessor::from_parts(
            EventCoalescer::new(EncoderState { last_counter: 9 }),
            ClickTimer::new(clock),
        );
        assert_eq!(processor.process(KnobEvent::rotation(Direction::Left, 9)), None);
        assert!(processor.process(KnobEvent::rotation(Direction::Left, 8)).is_some());
    }

    #[tokio::test]
    async fn run_forwards_in_order_and_stops_on_close() {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (message_tx, mut message_rx) = mpsc::channel(8);

        for event in [
            KnobEvent::rotation(Direction::Right, 1),
            KnobEvent::rotation(Direction::Right, 1),
            KnobEvent::button(1),
            KnobEvent::rotation(Direction::Left, 0),
        ] {
            event_tx.send(event.stamped(Instant::now())).await.unwrap();
        }
        drop(event_tx);

        KnobProcessor::default()
            .run(event_rx, message_tx, CancellationToken::new())
            .await
            .unwrap();

        let mut kinds = Vec::new();
        while let Some(message) = message_rx.recv().await {
            kinds.push((message.kind, message.value));
        }
        assert_eq!(
            kinds,
            vec![
                (EventKind::RotateRight, 1),
                (EventKind::Click, 1),
                (EventKind::RotateLeft, 0),
            ]
        );
    }

    #[tokio::test]
    async fn run_times_events_at_their_edges() {
        let (event_tx, event_rx) = mpsc::channel(8);
        let (message_tx, mut message_rx) = mpsc::channel(8);

        // Both queued long before the processor sees them
        let edge = Instant::now();
        event_tx
            .send(KnobEvent::rotation(Direction::Right, 1).stamped(edge))
            .await
            .unwrap();
        event_tx
            .send(KnobEvent::button(1).stamped(edge + Duration::from_millis(40)))
            .await
            .unwrap();
        drop(event_tx);
        tokio::time::sleep(Duration::from_millis(100)).await;

        KnobProcessor::default()
            .run(event_rx, message_tx, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            message_rx.recv().await,
            Some(KnobMessage::new(EventKind::RotateRight, 1, 0))
        );
        assert_eq!(
            message_rx.recv().await,
            Some(KnobMessage::new(EventKind::Click, 1, 40))
        );
    }

    #[tokio::test]
    async fn run_returns_when_cancelled() {
        let (_event_tx, event_rx) = mpsc::channel(1);
        let (message_tx, _message_rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        token.cancel();

        let result = KnobProcessor::default()
            .run(event_rx, message_tx, token)
            .await;
        assert!(result.is_ok());
    }
}
