//! Telegram update handlers.
//!
//! Every message update is converted into a core `IncomingMessage` and handed
//! to the archive daemon. The daemon reports failures to the chat itself.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tracing::error;

use storer_core::{
    daemon::ArchiveDaemon,
    domain::{ChatId, MessageId, UserId},
    messaging::types::{IncomingMessage, Sender, VideoRef},
};

pub async fn handle_message(msg: Message, daemon: Arc<ArchiveDaemon>) -> ResponseResult<()> {
    let incoming = to_incoming(&msg);
    if let Err(e) = daemon.handle_message(incoming).await {
        error!(
            chat_id = msg.chat.id.0,
            message_id = msg.id.0,
            error = %e,
            "update failed"
        );
    }
    Ok(())
}

/// Text for text messages, caption for videos. Other media carry no text.
pub fn to_incoming(msg: &Message) -> IncomingMessage {
    let sender = msg
        .from()
        .map(|u| Sender {
            username: u.username.clone(),
            id: Some(UserId(u.id.0 as i64)),
        })
        .unwrap_or_default();

    IncomingMessage {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
        text: msg
            .text()
            .or_else(|| msg.video().and(msg.caption()))
            .map(str::to_string),
        media_group_id: msg.media_group_id().map(|g| g.to_string()),
        sender,
        video: msg.video().map(|v| VideoRef {
            file_id: v.file.id.clone(),
            file_name: v.file_name.clone(),
        }),
        chat_title: msg.chat.title().map(str::to_string),
    }
}
