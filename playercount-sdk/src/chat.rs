//! Chat buffer and outbound message validation.

use std::collections::VecDeque;

use crate::frame::{ChatEntry, OutboundFrame};

/// Chat message rejected before sending.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("chat message is empty")]
    Empty,
    #[error("chat message is {len} UTF-16 units long, limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Trim `content` and build a chat frame if the result is 1..=`max_len`
/// long.
///
/// Length is measured in UTF-16 code units, the unit the relay and the
/// editor's input box limit by. Characters outside the BMP count twice.
pub fn validate_message(content: &str, max_len: usize) -> Result<OutboundFrame, ValidationError> {
    let trimmed = content.trim();
    let len = trimmed.encode_utf16().count();
    if len == 0 {
        return Err(ValidationError::Empty);
    }
    if len > max_len {
        return Err(ValidationError::TooLong { len, max: max_len });
    }
    Ok(OutboundFrame::Chat {
        message: trimmed.to_string(),
    })
}

/// Bounded chat history. The oldest line is evicted first.
#[derive(Debug, Clone)]
pub struct ChatLog {
    entries: VecDeque<ChatEntry>,
    capacity: usize,
    /// Lines ever pushed, evicted ones included.
    total: u64,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    pub fn push(&mut self, entry: ChatEntry) {
        self.entries.push_back(entry);
        self.total += 1;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Replay history in order, as if each line arrived on its own.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = ChatEntry>) {
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ChatEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_received(&self) -> u64 {
        self.total
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: usize) -> ChatEntry {
        ChatEntry::new(format!("user{i}"), format!("message {i}"))
    }

    #[test]
    fn test_log_evicts_oldest_first() {
        let mut log = ChatLog::new(50);
        for i in 0..57 {
            log.push(entry(i));
            assert!(log.len() <= 50);
        }
        assert_eq!(log.len(), 50);
        assert_eq!(log.total_received(), 57);
        let kept: Vec<_> = log.iter().map(|e| e.message.clone()).collect();
        assert_eq!(kept.first().map(String::as_str), Some("message 7"));
        assert_eq!(kept.last().map(String::as_str), Some("message 56"));
    }

    #[test]
    fn test_extend_replays_in_order() {
        let mut log = ChatLog::new(2);
        log.extend((0..3).map(entry));
        let kept: Vec<_> = log.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(kept, vec!["user1", "user2"]);
        assert_eq!(log.latest().map(|e| e.username.as_str()), Some("user2"));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut log = ChatLog::new(0);
        log.push(entry(0));
        assert!(log.is_empty());
    }

    #[test]
    fn test_validate_trims() {
        let frame = validate_message("  hello  ", 250).unwrap();
        assert_eq!(
            frame,
            OutboundFrame::Chat {
                message: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_validate_rejects_empty_and_whitespace() {
        assert_eq!(validate_message("", 250), Err(ValidationError::Empty));
        assert_eq!(validate_message(" \t\n", 250), Err(ValidationError::Empty));
    }

    #[test]
    fn test_validate_length_boundary() {
        let exact = "a".repeat(250);
        assert!(validate_message(&exact, 250).is_ok());
        let over = "a".repeat(251);
        assert_eq!(
            validate_message(&over, 250),
            Err(ValidationError::TooLong { len: 251, max: 250 })
        );
    }

    #[test]
    fn test_validate_counts_utf16_units_not_bytes() {
        let accented = "é".repeat(250);
        assert!(validate_message(&accented, 250).is_ok());
    }

    #[test]
    fn test_validate_counts_surrogate_pairs_twice() {
        let emoji = "\u{1F600}".repeat(125);
        assert!(validate_message(&emoji, 250).is_ok());

        let too_many = "\u{1F600}".repeat(200);
        assert_eq!(
            validate_message(&too_many, 250),
            Err(ValidationError::TooLong { len: 400, max: 250 })
        );

        let mixed = format!("{}a", "\u{1F600}".repeat(125));
        assert_eq!(
            validate_message(&mixed, 250),
            Err(ValidationError::TooLong { len: 251, max: 250 })
        );
    }
}
