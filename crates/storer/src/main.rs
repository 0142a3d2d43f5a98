use anyhow::Context;
use tokio::task::JoinSet;
use tracing::{error, info};

use storer_core::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    storer_core::logging::init("storer")?;

    let cfg = Config::load().context("failed to load bot settings")?;
    info!(bots = cfg.bots.len(), "starting");

    let mut bots = JoinSet::new();
    for bot in cfg.bots {
        let name = bot.name.clone();
        bots.spawn(async move { (name, storer_telegram::router::run_polling(bot).await) });
    }

    while let Some(joined) = bots.join_next().await {
        match joined {
            Ok((name, Ok(()))) => info!(bot = %name, "bot stopped"),
            Ok((name, Err(e))) => error!(bot = %name, error = %format!("{e:#}"), "bot failed"),
            Err(e) => error!(error = %e, "bot task panicked"),
        }
    }

    Ok(())
}
