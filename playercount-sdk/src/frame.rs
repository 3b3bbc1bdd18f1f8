//! Wire frames exchanged with the relay.
//!
//! Every frame is a JSON object tagged by its `header` field. Inbound and
//! outbound frames are closed sets; anything else the relay sends is
//! filtered out by the router before it reaches [`InboundFrame`].

use serde::{Deserialize, Serialize};

/// Frames the client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "header", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Registration handshake. Sent once anonymously, then once more after
    /// the host reports a logged-in account.
    Init {
        logged_in: bool,
        username: Option<String>,
    },
    /// A chat line. Only ever built through [`crate::chat::validate_message`].
    Chat { message: String },
}

impl OutboundFrame {
    /// Serialize to the JSON text carried by a single transport message.
    pub fn to_json(&self) -> String {
        // Both variants contain only strings, bools and options.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn is_handshake(&self) -> bool {
        matches!(self, OutboundFrame::Init { .. })
    }
}

/// Frames the relay sends to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "header", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Full replacement of the online player view.
    Count(PlayerSnapshot),
    /// One new chat line.
    Chat(ChatEntry),
    /// Recent chat history, oldest first.
    Recovery { messages: Vec<ChatEntry> },
}

impl InboundFrame {
    /// Header values this client understands. Other headers are ignored.
    pub const HEADERS: [&'static str; 3] = ["count", "chat", "recovery"];
}

/// Snapshot of everyone online, as reported by the relay.
///
/// The two counts are reported independently of `players`; `players.len()`
/// is normally `<= total_count` but nothing enforces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Players online in the editor as a whole.
    pub official_count: i64,
    /// Players connected to the relay, logged in or not.
    #[serde(rename = "count")]
    pub total_count: i64,
    /// Logged-in players.
    #[serde(rename = "users")]
    pub players: Vec<Player>,
    /// Camera directions of visible players. Not index-aligned with `players`.
    pub positions: Vec<AngularPosition>,
}

impl PlayerSnapshot {
    /// Number of logged-in players listed in this snapshot.
    pub fn logged_in_count(&self) -> usize {
        self.players.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
}

/// An angular direction in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AngularPosition {
    #[serde(rename = "x")]
    pub longitude_deg: f64,
    #[serde(rename = "y")]
    pub latitude_deg: f64,
}

impl AngularPosition {
    pub fn new(longitude_deg: f64, latitude_deg: f64) -> Self {
        Self {
            longitude_deg,
            latitude_deg,
        }
    }
}

/// A single chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub username: String,
    pub message: String,
}

impl ChatEntry {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            message: message.into(),
        }
    }
}
