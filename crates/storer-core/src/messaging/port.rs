use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    Result,
};

/// Outbound side of the bot transport.
///
/// The Telegram adapter implements this over teloxide; tests use in-memory fakes.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Send plain text, optionally as a reply to `reply_to`.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef>;

    /// Fetch the full contents of an uploaded file.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;
}
