//! Message transport between a worker session and its worker.
//!
//! The server adapts a WebSocket to [`WorkerTransport`]; tests use the
//! in-memory [`ChannelTransport`].

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// A duplex stream of text messages.
#[async_trait]
pub trait WorkerTransport: Send {
    /// Next text message, or `None` once the peer has closed the connection.
    async fn receive(&mut self) -> Result<Option<String>, TransportError>;

    async fn send(&mut self, message: &str) -> Result<(), TransportError>;
}

/// In-memory transport backed by a pair of channels.
pub struct ChannelTransport {
    rx: mpsc::Receiver<String>,
    tx: mpsc::Sender<String>,
}

impl ChannelTransport {
    /// Two connected ends: whatever one sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel(32);
        let (tx_b, rx_a) = mpsc::channel(32);
        (Self { rx: rx_a, tx: tx_a }, Self { rx: rx_b, tx: tx_b })
    }
}

#[async_trait]
impl WorkerTransport for ChannelTransport {
    async fn receive(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.recv().await)
    }

    async fn send(&mut self, message: &str) -> Result<(), TransportError> {
        self.tx
            .send(message.to_string())
            .await
            .map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_is_connected_both_ways() {
        let (mut a, mut b) = ChannelTransport::pair();

        a.send("init").await.unwrap();
        assert_eq!(b.receive().await.unwrap(), Some("init".to_string()));

        b.send("exit").await.unwrap();
        assert_eq!(a.receive().await.unwrap(), Some("exit".to_string()));
    }

    #[tokio::test]
    async fn dropped_peer_reads_as_closed() {
        let (mut a, b) = ChannelTransport::pair();
        drop(b);
        assert_eq!(a.receive().await.unwrap(), None);
        assert!(matches!(a.send("init").await, Err(TransportError::Closed)));
    }
}
