//! Transport seam between the session and the relay.
//!
//! A [`Connector`] opens one text-frame connection per call. The session owns
//! the resulting [`Connection`] exclusively; dropping it closes the link.

use std::pin::Pin;

use futures::future::BoxFuture;
use futures::{Sink, Stream};

pub mod memory;
pub mod ws;

pub use memory::{MemoryConnector, MemoryPeer};
pub use ws::WsConnector;

/// Outbound half: one JSON text frame per item.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Inbound half. Ends (or yields an error) when the connection closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open, full-duplex text connection.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Transport failures. All of them are recoverable: the session reacts by
/// scheduling a reconnect.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("connection closed: {0}")]
    Closed(String),
}

/// Opens connections to the relay.
pub trait Connector: Send + Sync {
    /// Start connecting to `url`. The returned future owns everything it needs
    /// so the session can drop it to abandon the attempt.
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, TransportError>>;
}
