use crate::domain::{ChatId, MessageId, MessageRef, UserId};

/// Messenger-agnostic view of one incoming chat message.
#[derive(Clone, Debug, Default)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    /// Message text, or the caption of a video. Captions of other media are
    /// left out: they are neither context nor directives.
    pub text: Option<String>,
    pub media_group_id: Option<String>,
    pub sender: Sender,
    pub video: Option<VideoRef>,
    pub chat_title: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Sender {
    pub username: Option<String>,
    pub id: Option<UserId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoRef {
    pub file_id: String,
    pub file_name: Option<String>,
}

impl IncomingMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }

    /// Text that is present and not just whitespace.
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn non_empty_media_group(&self) -> Option<&str> {
        self.media_group_id
            .as_deref()
            .filter(|g| !g.trim().is_empty())
    }

    pub fn is_video(&self) -> bool {
        self.video.is_some()
    }
}
