use std::path::Path;

use async_trait::async_trait;

use crate::Result;

/// Looks up this host's public address (for the IP echo command).
#[async_trait]
pub trait IpEcho: Send + Sync {
    async fn public_ip(&self) -> Result<String>;
}

/// Best-effort rewrite of the title tag embedded in a saved video.
#[async_trait]
pub trait TitleTagger: Send + Sync {
    /// Returns `Ok(false)` when the file was skipped (unsupported container,
    /// no existing title), `Ok(true)` when the tag was rewritten.
    async fn set_title(&self, path: &Path, title: &str) -> Result<bool>;
}
