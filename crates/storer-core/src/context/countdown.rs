use std::collections::HashMap;

use crate::domain::{ChatId, MessageId};

/// "Apply this caption to the next N messages", declared by a text that starts
/// with a number, e.g. `3,folder=trip`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountdownDirective {
    pub caption: String,
    pub remaining: u32,
    pub origin: MessageId,
}

/// At most one active directive per chat.
#[derive(Debug, Default)]
pub struct Countdowns {
    by_chat: HashMap<ChatId, CountdownDirective>,
}

impl Countdowns {
    /// Install a directive if `text` starts with a positive count. A newer
    /// directive replaces the chat's current one.
    pub fn install_if_directive(&mut self, chat_id: ChatId, origin: MessageId, text: &str) -> bool {
        let Some(count) = leading_count(text) else {
            return false;
        };
        self.by_chat.insert(
            chat_id,
            CountdownDirective {
                caption: text.to_string(),
                remaining: count,
                origin,
            },
        );
        true
    }

    pub fn get(&self, chat_id: ChatId) -> Option<&CountdownDirective> {
        self.by_chat.get(&chat_id)
    }

    /// Consume one slot of the chat's directive. Returns the remaining count,
    /// or `None` when the chat had no directive.
    pub fn tick(&mut self, chat_id: ChatId) -> Option<u32> {
        let directive = self.by_chat.get_mut(&chat_id)?;
        directive.remaining = directive.remaining.saturating_sub(1);
        let remaining = directive.remaining;
        if remaining == 0 {
            self.by_chat.remove(&chat_id);
        }
        Some(remaining)
    }

    pub fn len(&self) -> usize {
        self.by_chat.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_chat.is_empty()
    }
}

/// Positive integer formed by the leading ASCII digits of `text`.
pub fn leading_count(text: &str) -> Option<u32> {
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}
