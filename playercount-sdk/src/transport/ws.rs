//! WebSocket connector backed by tokio-tungstenite.

use futures::future::{self, BoxFuture};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use super::{Connection, Connector, TransportError};

/// Connects with `ws://` or `wss://` (rustls + webpki roots).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Connection, TransportError>> {
        let url = url.to_string();
        Box::pin(async move {
            install_crypto_provider();

            let (socket, response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;
            tracing::debug!(%url, status = %response.status(), "relay websocket open");

            let (write, read) = socket.split();
            let sink = write
                .sink_map_err(TransportError::from)
                .with(|text: String| future::ready(Ok::<_, TransportError>(Message::text(text))));
            let stream = read.filter_map(|message| future::ready(text_frame(message)));

            Ok(Connection {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}

/// Keep text frames, surface close and errors, skip control and binary frames.
fn text_frame(
    message: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<String, TransportError>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
        Ok(Message::Close(frame)) => {
            let reason = frame
                .map(|f| format!("{} {}", f.code, f.reason.as_str()))
                .unwrap_or_else(|| "closed by relay".to_string());
            Some(Err(TransportError::Closed(reason)))
        }
        Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(e.into())),
    }
}

fn install_crypto_provider() {
    // Already installed is fine; only the first call wins.
    let _ = rustls::crypto::ring::default_provider().install_default();
}
