//! Telegram adapter (teloxide).
//!
//! Implements the `storer-core` MessagingPort over the Telegram Bot API and
//! runs the long-polling dispatcher that feeds the archive daemon.

use std::path::Path;

use async_trait::async_trait;

use teloxide::{net::Download, prelude::*};

use tokio::time::sleep;
use tracing::warn;

pub mod handlers;
pub mod router;

use storer_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    /// `getFile` answers with a local path (self-hosted Bot API server).
    local_files: bool,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, local_files: bool) -> Self {
        Self { bot, local_files }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(wait)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    let d = wait;
                    warn!(retry_after = ?d, "telegram rate limit hit, retrying");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                let req = self.bot.send_message(Self::tg_chat(chat_id), text.to_string());
                match reply_to {
                    Some(id) => req.reply_to_message_id(Self::tg_msg_id(id)),
                    None => req,
                }
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let file = self
            .with_retry(|| self.bot.get_file(file_id.to_string()))
            .await?;

        if self.local_files && Path::new(&file.path).is_absolute() {
            return Ok(tokio::fs::read(&file.path).await?);
        }

        let mut buf = Vec::new();
        self.bot
            .download_file(&file.path, &mut buf)
            .await
            .map_err(|e| Error::Transport(format!("download of {file_id} failed: {e}")))?;
        Ok(buf)
    }
}
