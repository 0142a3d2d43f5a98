use std::{fmt, time::Duration};

use moka::sync::Cache;

use crate::domain::ChatMessageKey;

use super::cache::{context_cache, settled_len};

/// Text of recently seen messages, keyed by (chat, message id).
///
/// Only ever read through a one-message lookback.
pub struct MessageHistory {
    entries: Cache<ChatMessageKey, String>,
}

impl MessageHistory {
    pub fn new(capacity: usize, idle: Option<Duration>) -> Self {
        Self {
            entries: context_cache(capacity, idle),
        }
    }

    pub fn record(&mut self, key: ChatMessageKey, text: &str) {
        self.entries.insert(key, text.to_string());
    }

    pub fn get(&self, key: &ChatMessageKey) -> Option<String> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        settled_len(&self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for MessageHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHistory")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
