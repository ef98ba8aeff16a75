//! Knob Handle - lifecycle of the input, processing and transmit stages
//!
//! Wires the three stages together with bounded channels and a shared
//! cancellation token:
//!
//! ```text
//! GpioInput ─[KnobEvent]→ KnobProcessor ─[KnobMessage]→ UdpTransmitter
//!  (blocking thread)       (tokio task)                  (tokio task)
//! ```
//!
//! A failing input stage is fatal: it stops the other stages and its error
//! is returned to the caller. Transmission failures never surface here.

use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::event_processor::{KnobProcessor, ProcessorError};
use super::gpio_input::{GpioInput, InputError, InputSettings};
use crate::config::KnobConfig;
use crate::transmit::{TransmitError, UdpTransmitter};

// Bursts from a fast spin stay well below this
const CHANNEL_CAPACITY: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum KnobError {
    #[error("Input error: {0}")]
    InputError(#[from] InputError),

    #[error("Processor error: {0}")]
    ProcessorError(#[from] ProcessorError),

    #[error("Transmit error: {0}")]
    TransmitError(#[from] TransmitError),

    #[error("Task error: {0}")]
    TaskError(String),
}

impl From<JoinError> for KnobError {
    fn from(e: JoinError) -> Self {
        KnobError::TaskError(e.to_string())
    }
}

/// Running knob pipeline
pub struct KnobHandle {
    shutdown: CancellationToken,
    input_task: JoinHandle<Result<(), InputError>>,
    processor_task: JoinHandle<Result<(), ProcessorError>>,
    transmitter_task: JoinHandle<u64>,
}

impl KnobHandle {
    /// Binds the outbound socket, claims the GPIO lines and starts all stages.
    ///
    /// Fails before anything is spawned if the socket cannot be bound or a
    /// line cannot be acquired. The listener itself is looked up per send.
    pub async fn spawn(config: &KnobConfig) -> Result<Self, KnobError> {
        info!("Initializing knob pipeline: {}", config);

        let transmitter =
            UdpTransmitter::connect(&config.listener_address, config.listener_port).await?;
        let input = GpioInput::create(InputSettings::from(config))?;

        let (event_sender, event_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let (message_sender, message_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        debug!("Created pipeline channels with capacity {}", CHANNEL_CAPACITY);

        let shutdown = CancellationToken::new();

        let transmitter_task = tokio::spawn(transmitter.run(message_receiver, shutdown.clone()));

        let processor_task = tokio::spawn(KnobProcessor::default().run(
            event_receiver,
            message_sender,
            shutdown.clone(),
        ));

        let input_shutdown = shutdown.clone();
        let input_task = tokio::task::spawn_blocking(move || {
            let mut watching = input.watch()?;
            let result = watching.run_watch_loop(event_sender, input_shutdown);
            drop(watching);
            info!("GPIO lines released");
            result
        });

        info!("rotary knob started");
        Ok(Self::from_tasks(
            shutdown,
            input_task,
            processor_task,
            transmitter_task,
        ))
    }

    /// Takes over already running stages that all watch `shutdown`
    pub(crate) fn from_tasks(
        shutdown: CancellationToken,
        input_task: JoinHandle<Result<(), InputError>>,
        processor_task: JoinHandle<Result<(), ProcessorError>>,
        transmitter_task: JoinHandle<u64>,
    ) -> Self {
        Self {
            shutdown,
            input_task,
            processor_task,
            transmitter_task,
        }
    }

    /// Runs until `stop` resolves or the input stage ends, then tears down.
    ///
    /// In-flight messages are not awaited beyond what the stages already hold.
    pub async fn run_until<F>(mut self, stop: F) -> Result<(), KnobError>
    where
        F: Future<Output = ()>,
    {
        let finished = tokio::select! {
            _ = stop => None,
            result = &mut self.input_task => Some(result),
        };

        self.shutdown.cancel();

        let input_result = match finished {
            Some(result) => {
                error!("Input stage ended unexpectedly");
                result
            }
            None => {
                info!("Stopping knob pipeline");
                self.input_task.await
            }
        };

        let processor_result = self.processor_task.await;
        self.transmitter_task.await?;

        input_result??;
        processor_result??;

        info!("rotary knob stopped");
        Ok(())
    }
}
