//! GPIO-backed input source
//!
//! Acquires the encoder CLK/DT lines and the button line through `rppal`
//! and turns their edges into [`KnobEvent`]s. All three lines are served by
//! one blocking poll loop, so decoding and everything downstream sees a
//! strictly serialized event stream.
//!
//! Pins are reset to their original state when the input is dropped.

use chrono::Local;
use rppal::gpio::{Gpio, InputPin, Trigger};
use statum::{machine, state};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::events::{KnobEvent, StampedEvent};
use super::quadrature::QuadratureDecoder;
use crate::config::KnobConfig;

// Upper bound on how long shutdown waits for the poll loop
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Line numbers and edge options for the input source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSettings {
    pub clk_pin: u8,
    pub dt_pin: u8,
    pub sw_pin: u8,
    pub sw_debounce: Option<Duration>,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self::from(&KnobConfig::default())
    }
}

impl From<&KnobConfig> for InputSettings {
    fn from(config: &KnobConfig) -> Self {
        Self {
            clk_pin: config.clk_pin,
            dt_pin: config.dt_pin,
            sw_pin: config.sw_pin,
            sw_debounce: config.sw_debounce(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("Failed to send event: {0}")]
    EventSendError(String),
}

#[state]
#[derive(Debug, Clone)]
pub enum InputState {
    Configured,
    Watching,
}

#[machine]
#[derive(Debug)]
pub struct GpioInput<S: InputState> {
    gpio: Gpio,
    clk: InputPin,
    dt: InputPin,
    sw: InputPin,
    settings: InputSettings,
    decoder: QuadratureDecoder,
}

impl<S: InputState> GpioInput<S> {
    pub fn settings(&self) -> &InputSettings {
        &self.settings
    }
}

impl GpioInput<Configured> {
    /// Claims the three input lines
    pub fn create(settings: InputSettings) -> Result<Self, InputError> {
        info!(
            "Acquiring GPIO lines CLK: {} DT: {} SW: {}",
            settings.clk_pin, settings.dt_pin, settings.sw_pin
        );

        let gpio = Gpio::new().map_err(|e| {
            error!("Failed to open GPIO peripheral: {}", e);
            e
        })?;
        let clk = gpio.get(settings.clk_pin)?.into_input();
        let dt = gpio.get(settings.dt_pin)?.into_input();
        let sw = gpio.get(settings.sw_pin)?.into_input();

        Ok(Self::new(
            gpio,
            clk,
            dt,
            sw,
            settings,
            QuadratureDecoder::default(),
        ))
    }

    /// Enables edge detection and transitions to Watching
    pub fn watch(mut self) -> Result<GpioInput<Watching>, InputError> {
        self.clk.set_interrupt(Trigger::Both, None)?;
        self.dt.set_interrupt(Trigger::Both, None)?;
        self.sw
            .set_interrupt(Trigger::RisingEdge, self.settings.sw_debounce)?;

        self.decoder = QuadratureDecoder::new(self.clk.is_high(), self.dt.is_high());
        info!("Initial sw: {:?}", self.sw.read());
        debug!(
            "Initial encoder levels CLK: {:?} DT: {:?}",
            self.clk.read(),
            self.dt.read()
        );

        info!("Edge detection enabled, transitioning to Watching state");
        Ok(self.transition())
    }
}

impl GpioInput<Watching> {
    /// Waits up to the poll timeout for the next decoded event, stamped
    /// with the instant its edge was read
    pub fn next_event(&mut self) -> Result<Option<StampedEvent>, InputError> {
        let polled = self.gpio.poll_interrupts(
            &[&self.clk, &self.dt, &self.sw],
            false,
            Some(POLL_TIMEOUT),
        )?;

        let Some((pin, event)) = polled else {
            return Ok(None);
        };
        let at = Instant::now();
        let pin = pin.pin();
        let rising = matches!(event.trigger, Trigger::RisingEdge);
        debug!("Edge on pin {}: {:?}", pin, event);

        Ok(translate_edge(&mut self.decoder, &self.settings, pin, rising)
            .map(|event| event.stamped(at)))
    }

    /// Blocks until cancelled, pushing events to the processor in order
    pub fn run_watch_loop(
        &mut self,
        event_sender: mpsc::Sender<StampedEvent>,
        shutdown: CancellationToken,
    ) -> Result<(), InputError> {
        info!("Starting GPIO watch loop");

        while !shutdown.is_cancelled() {
            let Some(event) = self.next_event()? else {
                continue;
            };

            if let Err(e) = event_sender.blocking_send(event) {
                if shutdown.is_cancelled() {
                    break;
                }
                error!("Failed to send event to processor: {}", e);
                return Err(InputError::EventSendError(e.to_string()));
            }
        }

        info!("GPIO watch loop stopped");
        Ok(())
    }
}

// Routes an edge to the decoder or the button, by line number
fn translate_edge(
    decoder: &mut QuadratureDecoder,
    settings: &InputSettings,
    pin: u8,
    rising: bool,
) -> Option<KnobEvent> {
    if pin == settings.clk_pin {
        decoder.clock_changed(rising).map(KnobEvent::Rotation)
    } else if pin == settings.dt_pin {
        decoder.data_changed(rising).map(KnobEvent::Rotation)
    } else if pin == settings.sw_pin {
        let value = i32::from(rising);
        info!(
            "swClicked {} at {}",
            value,
            Local::now().format("%H:%M:%S.%3f")
        );
        Some(KnobEvent::button(value))
    } else {
        debug!("Ignoring edge on unknown pin {}", pin);
        None
    }
}
