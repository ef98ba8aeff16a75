//! Outbound datagram delivery
//!
//! Best effort only: a failed send is logged and the next message is tried
//! independently. Nothing is retried or acknowledged.

pub mod udp_sender;

pub use udp_sender::{TransmitError, UdpTransmitter};
