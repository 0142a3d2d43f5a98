use std::{
    io::BufReader,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use mp4::Metadata;
use tokio::process::Command;

use crate::{errors::Error, ports::TitleTagger, Result};

/// Rewrites the MP4 title tag with `ffmpeg -c copy`.
///
/// Only files that already carry a title are touched. `.mov` and anything that
/// is not an MP4 container are skipped.
pub struct FfmpegTitleTagger {
    ffmpeg: PathBuf,
}

impl FfmpegTitleTagger {
    pub fn new(ffmpeg: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
        }
    }
}

#[async_trait]
impl TitleTagger for FfmpegTitleTagger {
    async fn set_title(&self, path: &Path, title: &str) -> Result<bool> {
        if !is_taggable(path) {
            return Ok(false);
        }

        let source = path.to_path_buf();
        let existing = tokio::task::spawn_blocking(move || existing_title(&source))
            .await
            .map_err(|e| rewrite_err(path, format!("title lookup panicked: {e}")))??;
        if existing.is_none() {
            return Ok(false);
        }

        let tmp = retag_path(path);
        let out = Command::new(&self.ffmpeg)
            .arg("-y")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args(["-map", "0", "-c", "copy", "-metadata"])
            .arg(format!("title={title}"))
            .arg(&tmp)
            .output()
            .await
            .map_err(|e| rewrite_err(path, format!("failed to run ffmpeg: {e}")))?;

        if !out.status.success() {
            let _ = tokio::fs::remove_file(&tmp).await;
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(rewrite_err(
                path,
                format!("ffmpeg exited with {}: {}", out.status, stderr.trim()),
            ));
        }

        tokio::fs::rename(&tmp, path).await?;
        Ok(true)
    }
}

fn is_taggable(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    matches!(ext.as_str(), "mp4" | "m4v")
}

fn existing_title(path: &Path) -> Result<Option<String>> {
    let file = std::fs::File::open(path)?;
    let size = file.metadata()?.len();
    let reader = mp4::Mp4Reader::read_header(BufReader::new(file), size)
        .map_err(|e| rewrite_err(path, format!("not a readable mp4: {e}")))?;
    let title = reader
        .metadata()
        .title()
        .map(|t| t.into_owned())
        .filter(|t| !t.trim().is_empty());
    Ok(title)
}

fn retag_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "mp4".to_string());
    path.with_file_name(format!(".{name}.retag.{ext}"))
}

fn rewrite_err(path: &Path, reason: String) -> Error {
    Error::MetadataRewrite {
        path: path.to_path_buf(),
        reason,
    }
}
