//! Sliding window of recent conversation messages.

use std::collections::VecDeque;

use crate::extractor::is_user_message;
use crate::model::Message;

/// Ordered, duplicate-free window of the most recent messages.
///
/// Appends go to the back; truncation drops from the front.
#[derive(Debug, Clone, Default)]
pub struct ConversationBuffer {
    messages: VecDeque<Message>,
}

impl ConversationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message unless it is already buffered or fails the message filter.
    ///
    /// Returns `true` if the message was added.
    pub fn append(&mut self, message: &str) -> bool {
        if !is_user_message(message) || self.contains(message) {
            return false;
        }
        self.messages.push_back(message.to_string());
        true
    }

    /// Keep only the last `capacity` messages.
    pub fn truncate(&mut self, capacity: usize) {
        while self.messages.len() > capacity {
            self.messages.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn contains(&self, message: &str) -> bool {
        self.messages.iter().any(|m| m == message)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Buffered messages, oldest first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }
}
