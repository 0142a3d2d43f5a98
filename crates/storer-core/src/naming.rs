//! Where an archived video goes: folder from the chat title and `folder=`,
//! file name from `file=` or from the message id and the uploaded name.

use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;

use crate::{args::Args, messaging::types::IncomingMessage};

const DEFAULT_EXTENSION: &str = ".mp4";

/// How the default per-chat folder is named.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FolderPolicy {
    /// Chat title; the chat id when the chat has no title.
    #[default]
    Title,
    /// `<title>_<chat id>`, stable across chat renames colliding on title.
    TitleWithChatId,
}

impl FolderPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "title" => Some(Self::Title),
            "title_with_id" | "title_with_chat_id" => Some(Self::TitleWithChatId),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageTarget {
    pub folder: PathBuf,
    pub file_name: String,
}

impl StorageTarget {
    pub fn path(&self) -> PathBuf {
        self.folder.join(&self.file_name)
    }
}

pub fn storage_target(
    root: &Path,
    msg: &IncomingMessage,
    args: &Args,
    delta: Option<i32>,
    policy: FolderPolicy,
    today: NaiveDate,
) -> StorageTarget {
    StorageTarget {
        folder: root.join(derive_folder(msg, args, policy)),
        file_name: derive_file(msg, args, delta, today),
    }
}

/// Folder relative to the archive root.
pub fn derive_folder(msg: &IncomingMessage, args: &Args, policy: FolderPolicy) -> PathBuf {
    let chat_dir = PathBuf::from(chat_folder(msg, policy));

    let Some(custom) = args.get("folder").map(sanitize_rel_path) else {
        return chat_dir;
    };
    if custom.as_os_str().is_empty() {
        return chat_dir;
    }

    if args.flag("title", true) {
        chat_dir.join(custom)
    } else {
        custom
    }
}

fn chat_folder(msg: &IncomingMessage, policy: FolderPolicy) -> String {
    let id = msg.chat_id.0.to_string();
    let title = msg.chat_title.as_deref().and_then(sanitize_component);
    match (policy, title) {
        (FolderPolicy::Title, Some(t)) => t,
        (FolderPolicy::TitleWithChatId, Some(t)) => format!("{t}_{id}"),
        (_, None) => id,
    }
}

/// File name inside the folder.
pub fn derive_file(
    msg: &IncomingMessage,
    args: &Args,
    delta: Option<i32>,
    today: NaiveDate,
) -> String {
    let id: String = msg
        .message_id
        .0
        .to_string()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let uploaded = msg
        .video
        .as_ref()
        .and_then(|v| v.file_name.as_deref())
        .and_then(acceptable_upload_name);

    let mut default_name = match uploaded {
        Some(name) => format!("{id}_{name}"),
        None => id,
    };
    let ext = match extension_of(&default_name) {
        Some(ext) => ext,
        None => {
            default_name.push_str(DEFAULT_EXTENSION);
            DEFAULT_EXTENSION.to_string()
        }
    };

    let Some(custom) = args.get("file").and_then(sanitize_component) else {
        return format!("{}_{default_name}", today.format("%y%m%d"));
    };

    let stem = strip_suffix_ignore_case(&custom, &ext).unwrap_or(&custom);
    match delta {
        Some(d) => format!("{stem}_{d}{ext}"),
        None => format!("{stem}{ext}"),
    }
}

/// Uploaded names with `@` or `!` (channel handles, promo junk) are dropped.
fn acceptable_upload_name(name: &str) -> Option<String> {
    if name.chars().any(|c| matches!(c, '@' | '!' | '/' | '\\')) {
        return None;
    }
    sanitize_component(name)
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{e}"))
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = s.len().checked_sub(suffix.len())?;
    let (stem, tail) = (s.get(..cut)?, s.get(cut..)?);
    (tail.eq_ignore_ascii_case(suffix) && !stem.is_empty()).then_some(stem)
}

/// One path component safe to join under the root: invalid characters become
/// `_`, and `.`/`..`/empty yield `None`.
pub fn sanitize_component(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().to_string();
    match cleaned.as_str() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}

/// Relative path from user input. Parent, root and prefix components are
/// dropped, so the result never leaves the directory it is joined to.
pub fn sanitize_rel_path(raw: &str) -> PathBuf {
    let normalized = raw.replace('\\', "/");
    let mut out = PathBuf::new();
    for comp in Path::new(&normalized).components() {
        if let Component::Normal(os) = comp {
            if let Some(part) = os.to_str().and_then(sanitize_component) {
                out.push(part);
            }
        }
    }
    out
}
