//! In-process transport. Each `connect` hands a [`MemoryPeer`] to whoever
//! holds the listener side, which then plays the relay.

use futures::channel::mpsc as fmpsc;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::{Connection, Connector, TransportError};

/// Connector whose connections terminate in this process.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    listener: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    /// Returns the connector and the receiver that yields one peer per
    /// accepted connection. Dropping the receiver makes every later
    /// connection attempt fail.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (listener, accepted) = mpsc::unbounded_channel();
        (Self { listener }, accepted)
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, TransportError>> {
        let (to_client, client_rx) = fmpsc::unbounded::<String>();
        let (client_tx, from_client) = fmpsc::unbounded::<String>();
        let peer = MemoryPeer {
            url: url.to_string(),
            to_client,
            from_client,
        };
        let accepted = self.listener.send(peer).map_err(|_| TransportError::Connect {
            url: url.to_string(),
            reason: "memory listener is gone".to_string(),
        });

        Box::pin(async move {
            accepted?;
            let sink = client_tx.sink_map_err(|e| TransportError::Closed(e.to_string()));
            Ok(Connection {
                sink: Box::pin(sink),
                stream: Box::pin(client_rx.map(Ok::<String, TransportError>)),
            })
        })
    }
}

/// Relay side of one in-memory connection. Dropping it closes the connection.
#[derive(Debug)]
pub struct MemoryPeer {
    url: String,
    to_client: fmpsc::UnboundedSender<String>,
    from_client: fmpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// URL the client asked for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Deliver a raw frame to the client. Returns false once the client has
    /// dropped the connection.
    pub fn push(&self, frame: impl Into<String>) -> bool {
        self.to_client.unbounded_send(frame.into()).is_ok()
    }

    /// Next frame the client sent, or `None` once it closed its side.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.from_client.next().await
    }

    /// Frame already sent by the client, without waiting.
    pub fn try_frame(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }
}
