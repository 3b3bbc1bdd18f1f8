//! Session configuration.
//!
//! Timings are stored in milliseconds so the struct maps one-to-one onto the
//! host's TOML config section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default relay endpoint.
pub const DEFAULT_RELAY_URL: &str = "wss://www.editor-playercount-display.swatdoge.eu";

/// Configuration for a [`crate::client::SessionClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Relay URL (`wss://` or `ws://`).
    pub url: String,
    /// Delay before reconnecting after the transport closes (ms).
    pub reconnect_after_close_delay: u64,
    /// Handshake timer period (ms).
    pub register_interval: u64,
    /// Chat lines kept by a [`crate::chat::ChatLog`].
    pub max_chat_messages: usize,
    /// Longest chat message accepted for sending, in UTF-16 code units.
    pub max_message_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RELAY_URL.to_string(),
            reconnect_after_close_delay: 5000,
            register_interval: 1000,
            max_chat_messages: 50,
            max_message_length: 250,
        }
    }
}

impl SessionConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_after_close_delay)
    }

    /// Handshake timer period. Never zero, a zero-length interval cannot tick.
    pub fn register_period(&self) -> Duration {
        Duration::from_millis(self.register_interval.max(1))
    }
}
