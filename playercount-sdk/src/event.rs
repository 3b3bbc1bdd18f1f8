//! Events emitted by the session client for the UI layer to consume.

use crate::frame::{ChatEntry, PlayerSnapshot};
use crate::identity::Identity;

/// Events that the session emits to the consumer (chat box, globe, logs).
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A connection attempt has started.
    Connecting,

    /// The transport is open; the handshake timer is running.
    Connected,

    /// The authenticated handshake went out. Sent once per connection, and
    /// only if the host reported an account before the connection closed.
    Registered {
        identity: Identity,
    },

    /// New snapshot of everyone online. Replaces the previous one entirely.
    Count(PlayerSnapshot),

    /// A single chat line.
    Chat(ChatEntry),

    /// Chat history replay, oldest first.
    Recovery(Vec<ChatEntry>),

    /// An inbound frame was dropped because it could not be decoded.
    DecodeFailed {
        error: String,
    },

    /// The connection closed or could not be opened. A reconnect is scheduled.
    Disconnected {
        reason: String,
    },
}
