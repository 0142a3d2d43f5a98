use std::path::PathBuf;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the daemon can
/// report failures to the chat consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metadata rewrite failed for {path}: {reason}")]
    MetadataRewrite { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
