use crate::Result;

/// Initialize tracing for the bot.
///
/// Default: info for our crates, warn for everything else. `RUST_LOG` overrides.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,storer=info,storer_core=info,storer_telegram=info,{service_name}=info"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| crate::Error::Config(format!("failed to init logging: {e}")))?;

    Ok(())
}
