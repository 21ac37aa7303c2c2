use std::convert::Infallible;

use async_trait::async_trait;
use axum::body::Body;
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::RelayError;

/// Client-facing output that accepts incremental writes and explicit flushes.
#[async_trait]
pub trait FragmentSink: Send {
    async fn write(&mut self, fragment: &str) -> Result<(), RelayError>;

    /// Push everything written so far to the client.
    async fn flush(&mut self) -> Result<(), RelayError>;

    /// Whether the client side is known to be gone.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Sink backed by an HTTP response body. Each flush becomes one body frame.
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
    pending: BytesMut,
}

impl ChannelSink {
    /// Create a sink and the response body it feeds.
    ///
    /// The channel holds a single frame, so a flush waits until the previous fragment has
    /// been taken by the connection.
    pub fn new() -> (Self, Body) {
        let (tx, rx) = mpsc::channel(1);
        let sink = Self {
            tx,
            pending: BytesMut::new(),
        };
        (sink, Body::from_stream(ReceiverStream::new(rx)))
    }
}

#[async_trait]
impl FragmentSink for ChannelSink {
    async fn write(&mut self, fragment: &str) -> Result<(), RelayError> {
        if self.tx.is_closed() {
            return Err(RelayError::SinkWrite("client disconnected".to_string()));
        }
        self.pending.extend_from_slice(fragment.as_bytes());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), RelayError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let frame = self.pending.split().freeze();
        self.tx
            .send(Ok(frame))
            .await
            .map_err(|_| RelayError::SinkWrite("client disconnected".to_string()))
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
