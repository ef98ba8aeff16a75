use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::wire::KnobMessage;

#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    #[error("Failed to resolve listener {host}:{port}: {reason}")]
    ResolveError {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Failed to bind socket: {0}")]
    BindError(std::io::Error),

    #[error("Failed to send datagram to {destination}: {source}")]
    SendError {
        destination: SocketAddr,
        source: std::io::Error,
    },

    #[error("Short write to {destination}: {written} of {expected} bytes")]
    ShortWrite {
        destination: SocketAddr,
        written: usize,
        expected: usize,
    },
}

/// UDP socket bound to an ephemeral port, aimed at one listener.
///
/// The listener name is looked up on every send, so a listener that is
/// unreachable at startup or changes address is picked up by the next event.
#[derive(Debug)]
pub struct UdpTransmitter {
    socket: UdpSocket,
    host: String,
    port: u16,
}

impl UdpTransmitter {
    /// Binds an IPv4 socket, or an IPv6 one when `host` is an IPv6 literal.
    /// Only binding can fail here; the listener is not looked up yet.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransmitError> {
        let local: SocketAddr = if host.parse::<Ipv6Addr>().is_ok() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };
        Self::bind(local, host.to_string(), port).await
    }

    pub async fn bind_to(destination: SocketAddr) -> Result<Self, TransmitError> {
        let local: SocketAddr = if destination.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        Self::bind(local, destination.ip().to_string(), destination.port()).await
    }

    async fn bind(local: SocketAddr, host: String, port: u16) -> Result<Self, TransmitError> {
        let socket = UdpSocket::bind(local)
            .await
            .map_err(TransmitError::BindError)?;

        info!("listener: {}:{}", host, port);
        Ok(Self { socket, host, port })
    }

    /// Looks the listener up, keeping the first address of the socket's family
    pub async fn resolve(&self) -> Result<SocketAddr, TransmitError> {
        let resolve_error = |reason: String| TransmitError::ResolveError {
            host: self.host.clone(),
            port: self.port,
            reason,
        };

        let ipv4 = self
            .socket
            .local_addr()
            .map_err(|e| resolve_error(e.to_string()))?
            .is_ipv4();

        let mut candidates = lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| resolve_error(e.to_string()))?;

        candidates
            .find(|addr| addr.is_ipv4() == ipv4)
            .ok_or_else(|| {
                let family = if ipv4 { "IPv4" } else { "IPv6" };
                resolve_error(format!("no {} address found", family))
            })
    }

    /// Sends one encoded message
    pub async fn send(&self, message: &KnobMessage) -> Result<(), TransmitError> {
        let destination = self.resolve().await?;
        let payload = message.encode();
        let written = self
            .socket
            .send_to(&payload, destination)
            .await
            .map_err(|source| TransmitError::SendError {
                destination,
                source,
            })?;

        if written != payload.len() {
            return Err(TransmitError::ShortWrite {
                destination,
                written,
                expected: payload.len(),
            });
        }

        debug!("Sent {} to {}", message, destination);
        Ok(())
    }

    /// Ships messages until the channel closes or the token is cancelled.
    /// Send failures are logged and never stop the loop.
    ///
    /// Returns the number of failed sends.
    pub async fn run(
        self,
        mut message_receiver: mpsc::Receiver<KnobMessage>,
        shutdown: CancellationToken,
    ) -> u64 {
        info!("Starting transmitter towards {}:{}", self.host, self.port);
        let mut failures = 0u64;

        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                message = message_receiver.recv() => message,
            };

            let Some(message) = message else {
                warn!("Message channel closed, transmitter exiting");
                break;
            };

            if let Err(e) = self.send(&message).await {
                failures += 1;
                error!("Error when sending packet: {}", e);
            }
        }

        info!("Transmitter stopped ({} failed sends)", failures);
        failures
    }
}
