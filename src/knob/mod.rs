//! Knob subsystem: from GPIO edges to outbound messages
//!
//! ```text
//! GpioInput ──► KnobProcessor ──► UdpTransmitter
//! (KnobEvent)   (coalesce, time)   (9-byte datagram)
//! ```
//!
//! 1. [`gpio_input`] - line acquisition, edge polling, quadrature decoding
//! 2. [`event_processor`] - duplicate suppression and event latency
//! 3. [`knob_handle`] - spawns the stages and manages their lifecycle

pub mod click_timer;
pub mod coalescer;
pub mod event_processor;
pub mod events;
pub mod gpio_input;
pub mod knob_handle;
pub mod quadrature;
