//! Inbound frame decoding and classification.

use crate::frame::{ChatEntry, InboundFrame, PlayerSnapshot};

/// A frame that could not be decoded. The session logs it and moves on.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not a JSON object: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("frame has no string `header` field")]
    MissingHeader,
    #[error("malformed `{header}` frame: {source}")]
    Shape {
        header: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedEvent {
    /// Replaces the current snapshot outright.
    Count(PlayerSnapshot),
    Chat(ChatEntry),
    /// History replay, oldest first.
    Recovery(Vec<ChatEntry>),
}

impl RoutedEvent {
    /// Chat lines carried by this event, in the order they should be shown.
    pub fn chat_entries(&self) -> &[ChatEntry] {
        match self {
            RoutedEvent::Count(_) => &[],
            RoutedEvent::Chat(entry) => std::slice::from_ref(entry),
            RoutedEvent::Recovery(entries) => entries,
        }
    }
}

impl From<InboundFrame> for RoutedEvent {
    fn from(frame: InboundFrame) -> Self {
        match frame {
            InboundFrame::Count(snapshot) => RoutedEvent::Count(snapshot),
            InboundFrame::Chat(entry) => RoutedEvent::Chat(entry),
            InboundFrame::Recovery { messages } => RoutedEvent::Recovery(messages),
        }
    }
}

/// Decode one raw text frame.
///
/// Returns `Ok(None)` for well-formed frames with a header this client does
/// not know, so newer relays can add frame kinds without breaking older
/// clients.
pub fn route(raw: &str) -> Result<Option<RoutedEvent>, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(raw).map_err(DecodeError::NotJson)?;
    let header = value
        .get("header")
        .and_then(serde_json::Value::as_str)
        .ok_or(DecodeError::MissingHeader)?;

    if !InboundFrame::HEADERS.contains(&header) {
        tracing::trace!(header, "ignoring frame with unknown header");
        return Ok(None);
    }

    let header = header.to_string();
    let frame: InboundFrame =
        serde_json::from_value(value).map_err(|source| DecodeError::Shape { header, source })?;
    Ok(Some(frame.into()))
}
