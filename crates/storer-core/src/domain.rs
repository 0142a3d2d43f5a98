/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric). Sequential within a chat.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i32);

impl MessageId {
    /// The id of the message sent right before this one in the same chat.
    pub fn previous(self) -> Self {
        MessageId(self.0.wrapping_sub(1))
    }

    /// Positional offset from `origin` (the message that carried a caption).
    pub fn delta_from(self, origin: MessageId) -> i32 {
        self.0.wrapping_sub(origin.0)
    }
}

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Key of the message history table.
pub type ChatMessageKey = MessageRef;
