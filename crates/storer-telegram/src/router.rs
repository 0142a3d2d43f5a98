use std::sync::Arc;

use anyhow::Context;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use storer_core::{
    config::BotSettings,
    daemon::ArchiveDaemon,
    ip_echo::HttpIpEcho,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    metadata::FfmpegTitleTagger,
};

use crate::handlers;
use crate::TelegramMessenger;

/// Build the bot client, honouring a custom Bot API server url.
pub fn build_bot(settings: &BotSettings) -> anyhow::Result<Bot> {
    let bot = Bot::new(settings.token.clone());
    let Some(url) = settings.api_url.as_deref() else {
        return Ok(bot);
    };
    let url = reqwest::Url::parse(url)
        .with_context(|| format!("invalid Telegram API url for bot {}: {url}", settings.name))?;
    Ok(bot.set_api_url(url))
}

pub async fn run_polling(settings: BotSettings) -> anyhow::Result<()> {
    let bot = build_bot(&settings)?;

    match bot.get_me().await {
        Ok(me) => info!(bot = %settings.name, username = %me.username(), "bot started"),
        Err(e) => warn!(bot = %settings.name, error = %e, "getMe failed; polling anyway"),
    }
    info!(
        bot = %settings.name,
        root = ?settings.storer.root_dir,
        allowed_users = settings.storer.allowed_users.len(),
        "archive settings"
    );

    // 429s are rare for a reply-only bot, but albums arrive in bursts.
    let raw_messenger: Arc<dyn MessagingPort> =
        Arc::new(TelegramMessenger::new(bot.clone(), settings.local_files));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));
    let ip_echo = Arc::new(HttpIpEcho::new(settings.storer.ip_echo_url.clone())?);
    let tagger = Arc::new(FfmpegTitleTagger::new(settings.storer.ffmpeg_path.clone()));

    let daemon = Arc::new(ArchiveDaemon::new(
        settings.storer,
        messenger,
        ip_echo,
        tagger,
    ));

    let handler = Update::filter_message().endpoint(handlers::handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![daemon])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!(bot = %settings.name, "dispatcher stopped");
    Ok(())
}
