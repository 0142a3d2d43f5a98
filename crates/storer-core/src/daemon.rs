//! Per-update entry point: access control, IP echo, caption resolution,
//! download, write, title rewrite and replies.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{NaiveDate, Utc};
use tokio::{
    io::AsyncWriteExt,
    sync::{Mutex, OwnedMutexGuard},
};
use tracing::{debug, error, info, warn};

use crate::{
    args::Args,
    config::StorerSettings,
    context::ContextStore,
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{IncomingMessage, VideoRef},
    },
    naming::{self, StorageTarget},
    ports::{IpEcho, TitleTagger},
    Result,
};

/// Upper bound on `_N` suffixes tried before giving up on a file name.
const MAX_COLLISION_SUFFIX: u32 = 1000;

/// What happened to one update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Plain text: remembered as context, nothing archived.
    ContextRecorded,
    /// Sender is not on the allow-list. Nothing was sent back.
    AccessDenied,
    /// IP echo command answered.
    IpEchoed,
    /// IP echo prefix without a valid pass-key.
    CommandIgnored,
    /// Not a video (photo, sticker, ...).
    NotVideo,
    /// No root directory configured.
    Skipped,
    Saved(PathBuf),
}

/// One async mutex per chat, so a chat's updates are handled one at a time.
///
/// Locks nobody holds or waits for are dropped on the next acquisition.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.retain(|id, lock| *id == chat_id || Arc::strong_count(lock) > 1);
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Chats with a live lock entry.
    pub async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

pub struct ArchiveDaemon {
    settings: StorerSettings,
    context: ContextStore,
    messenger: Arc<dyn MessagingPort>,
    ip_echo: Arc<dyn IpEcho>,
    tagger: Arc<dyn TitleTagger>,
    chat_locks: ChatLocks,
    today: Clock,
}

impl ArchiveDaemon {
    pub fn new(
        settings: StorerSettings,
        messenger: Arc<dyn MessagingPort>,
        ip_echo: Arc<dyn IpEcho>,
        tagger: Arc<dyn TitleTagger>,
    ) -> Self {
        Self {
            context: ContextStore::new(settings.context_limits),
            settings,
            messenger,
            ip_echo,
            tagger,
            chat_locks: ChatLocks::default(),
            today: Box::new(|| Utc::now().date_naive()),
        }
    }

    /// Replace the date source used for file name stamps.
    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Box::new(today);
        self
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn settings(&self) -> &StorerSettings {
        &self.settings
    }

    /// Handle one incoming message.
    ///
    /// Errors are replied to the chat and logged here, then returned so the
    /// dispatcher can log them at its own boundary.
    pub async fn handle_message(&self, msg: IncomingMessage) -> Result<Outcome> {
        let _guard = self.chat_locks.lock_chat(msg.chat_id.0).await;

        if let Some(text) = msg.non_empty_text() {
            if !msg.is_video() {
                if text.starts_with(self.settings.ip_prefix.as_str()) {
                    return self.handle_command(&msg, text).await;
                }
                self.context.record_text(&msg);
                return Ok(Outcome::ContextRecorded);
            }
            self.context.record_text(&msg);
        }

        info!(
            chat_id = msg.chat_id.0,
            message_id = msg.message_id.0,
            "received message"
        );

        let result = self.process(&msg).await;

        if let Err(e) = &result {
            error!(
                chat_id = msg.chat_id.0,
                message_id = msg.message_id.0,
                error = %e,
                "failed to archive message"
            );
            let _ = self
                .messenger
                .send_text(msg.chat_id, &format!("Error. {e}"), None)
                .await;
        }

        // Every processed message consumes a countdown slot, denied senders included.
        if let Some(remaining) = self.context.tick_countdown(msg.message_ref()) {
            debug!(chat_id = msg.chat_id.0, remaining, "countdown ticked");
        }

        result
    }

    async fn process(&self, msg: &IncomingMessage) -> Result<Outcome> {
        if !self.settings.is_allowed(&msg.sender) {
            info!(
                username = msg.sender.username.as_deref().unwrap_or(""),
                user_id = msg.sender.id.map(|u| u.0),
                "video was not saved: user is not allowed"
            );
            return Ok(Outcome::AccessDenied);
        }

        let Some(video) = &msg.video else {
            return Ok(Outcome::NotVideo);
        };
        self.archive(msg, video).await
    }

    async fn handle_command(&self, msg: &IncomingMessage, text: &str) -> Result<Outcome> {
        if !self.settings.is_allowed(&msg.sender) {
            return Ok(Outcome::AccessDenied);
        }
        let key_ok = self
            .settings
            .pass_key
            .as_deref()
            .is_some_and(|key| !key.is_empty() && text.contains(key));
        if !key_ok {
            return Ok(Outcome::CommandIgnored);
        }

        let result = self.echo_ip(msg).await;
        if let Err(e) = &result {
            error!(chat_id = msg.chat_id.0, error = %e, "ip echo failed");
            let _ = self
                .messenger
                .send_text(msg.chat_id, &format!("Error. {e}"), None)
                .await;
        }
        result
    }

    async fn echo_ip(&self, msg: &IncomingMessage) -> Result<Outcome> {
        let ip = self.ip_echo.public_ip().await?;
        for line in [ip.clone(), format!("http://{ip}"), format!("https://{ip}")] {
            self.messenger
                .send_text(msg.chat_id, &line, Some(msg.message_id))
                .await?;
        }
        Ok(Outcome::IpEchoed)
    }

    async fn archive(&self, msg: &IncomingMessage, video: &VideoRef) -> Result<Outcome> {
        let Some(root) = self.settings.root_dir.as_deref() else {
            let e = Error::ConfigurationMissing("root directory".to_string());
            warn!(chat_id = msg.chat_id.0, "video was not saved: {e}");
            return Ok(Outcome::Skipped);
        };

        let resolution = self.context.resolve(msg);
        let args = Args::parse(resolution.caption.as_deref());
        debug!(
            source = resolution.source.as_str(),
            delta = ?resolution.delta,
            args = %args,
            "resolved caption"
        );

        let target = naming::storage_target(
            root,
            msg,
            &args,
            resolution.delta,
            self.settings.folder_policy,
            (self.today)(),
        );

        self.reply(msg, "Downloading...").await?;
        info!(
            chat_id = msg.chat_id.0,
            message_id = msg.message_id.0,
            "saving"
        );
        let bytes = self.messenger.download_file(&video.file_id).await?;

        tokio::fs::create_dir_all(&target.folder).await?;
        self.reply(msg, "Saving...").await?;
        let path = write_unique(&target, &bytes).await?;

        self.retitle(msg, &path).await?;

        info!(path = %path.display(), bytes = bytes.len(), "saved video");
        self.reply(msg, &format!("Saved {}", path.display()))
            .await?;
        Ok(Outcome::Saved(path))
    }

    /// Title rewrite failures are reported to the chat and otherwise ignored.
    async fn retitle(&self, msg: &IncomingMessage, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if let Err(e) = self.tagger.set_title(path, &name).await {
            warn!(path = %path.display(), error = %e, "title rewrite failed");
            self.reply(msg, &format!("Error changing title to {name}. {e}"))
                .await?;
        }
        Ok(())
    }

    async fn reply(&self, msg: &IncomingMessage, text: &str) -> Result<()> {
        self.messenger
            .send_text(msg.chat_id, text, Some(msg.message_id))
            .await?;
        Ok(())
    }
}

/// Write `bytes` to the target, never replacing an existing file: on a name
/// clash the first free `<stem>_<n><ext>` is used instead.
async fn write_unique(target: &StorageTarget, bytes: &[u8]) -> Result<PathBuf> {
    let (stem, ext) = split_extension(&target.file_name);

    for n in 0..MAX_COLLISION_SUFFIX {
        let name = if n == 0 {
            target.file_name.clone()
        } else {
            format!("{stem}_{n}{ext}")
        };
        let path = target.folder.join(name);

        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match opened {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::External(format!(
        "no free file name for {} in {}",
        target.file_name,
        target.folder.display()
    )))
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}
