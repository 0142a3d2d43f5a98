use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    args::Args,
    context::ContextLimits,
    errors::Error,
    ip_echo::DEFAULT_IP_ECHO_URL,
    messaging::types::Sender,
    naming::FolderPolicy,
    Result,
};

const DEFAULT_SETTINGS_FILE: &str = "args.txt";

/// Process configuration: one entry per bot to run.
#[derive(Clone, Debug)]
pub struct Config {
    pub bots: Vec<BotSettings>,
}

/// One bot: its transport settings plus the archive settings it serves.
#[derive(Clone, Debug)]
pub struct BotSettings {
    pub name: String,
    pub token: String,
    /// Custom Bot API server, e.g. a local `telegram-bot-api` instance.
    pub api_url: Option<String>,
    /// `getFile` returns a path on the local filesystem (local Bot API server).
    pub local_files: bool,
    pub storer: StorerSettings,
}

/// Everything the archive daemon needs to decide and write.
#[derive(Clone, Debug)]
pub struct StorerSettings {
    pub root_dir: Option<PathBuf>,
    /// Usernames (without `@`) and numeric ids.
    pub allowed_users: Vec<String>,
    pub ip_prefix: String,
    pub pass_key: Option<String>,
    pub folder_policy: FolderPolicy,
    pub context_limits: ContextLimits,
    pub ffmpeg_path: PathBuf,
    pub ip_echo_url: String,
}

impl Default for StorerSettings {
    fn default() -> Self {
        Self {
            root_dir: None,
            allowed_users: Vec::new(),
            ip_prefix: "/ip".to_string(),
            pass_key: None,
            folder_policy: FolderPolicy::Title,
            context_limits: ContextLimits::default(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ip_echo_url: DEFAULT_IP_ECHO_URL.to_string(),
        }
    }
}

impl StorerSettings {
    /// Sender matches the allow-list by username (case-insensitive) or numeric id.
    pub fn is_allowed(&self, sender: &Sender) -> bool {
        let id = sender.id.map(|u| u.0.to_string());
        self.allowed_users.iter().any(|allowed| {
            sender
                .username
                .as_deref()
                .is_some_and(|u| u.eq_ignore_ascii_case(allowed))
                || id.as_deref() == Some(allowed.as_str())
        })
    }

    /// Overlay a `Key=Value,Key=Value` custom settings string, as stored in the
    /// bot settings file.
    fn apply_custom(&mut self, raw: &str) {
        let args = Args::parse(Some(raw));
        if let Some(root) = args.get("rootdir") {
            self.root_dir = Some(PathBuf::from(root));
        }
        if let Some(users) = args.get("allowedusers") {
            self.allowed_users = parse_user_list(users);
        }
        if let Some(key) = args.get("passkey") {
            self.pass_key = Some(key.to_string());
        }
        if let Some(prefix) = args.get("ipprefix") {
            self.ip_prefix = prefix.to_string();
        }
        if let Some(policy) = args.get("folderpolicy").and_then(FolderPolicy::parse) {
            self.folder_policy = policy;
        }
    }
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    #[serde(rename = "BotSettings", default)]
    bot_settings: Vec<SettingsFileBot>,
}

#[derive(Debug, Deserialize)]
struct SettingsFileBot {
    #[serde(rename = "Token")]
    token: String,
    #[serde(rename = "BotName", default)]
    bot_name: Option<String>,
    #[serde(rename = "CustomSettings", default)]
    custom_settings: Option<String>,
}

impl Config {
    /// Load from `.env`, the environment and the optional JSON settings file.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let settings_json = match env_str("STORER_SETTINGS").and_then(non_empty) {
            Some(inline) => Some(inline),
            None => {
                let explicit = env_path("STORER_SETTINGS_FILE");
                let path = explicit
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
                match fs::read_to_string(&path) {
                    Ok(s) => Some(s),
                    Err(e) if explicit.is_some() => {
                        return Err(Error::Config(format!(
                            "cannot read settings file {}: {e}",
                            path.display()
                        )))
                    }
                    Err(_) => None,
                }
            }
        };

        Self::from_lookup(env_str, settings_json.as_deref())
    }

    /// Build from a variable lookup and optional settings JSON. Env values are
    /// the defaults; each settings-file bot overlays its custom settings.
    pub fn from_lookup(
        get: impl Fn(&str) -> Option<String>,
        settings_json: Option<&str>,
    ) -> Result<Self> {
        let base = base_storer_settings(&get);
        let api_url = get("TELEGRAM_API_URL").and_then(non_empty);
        let local_files = get("TELEGRAM_LOCAL_FILES")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let mut bots = Vec::new();

        if let Some(json) = settings_json.filter(|s| !s.trim().is_empty()) {
            let file: SettingsFile = serde_json::from_str(json)?;
            for (idx, b) in file.bot_settings.into_iter().enumerate() {
                if b.token.trim().is_empty() {
                    return Err(Error::Config(format!("bot #{idx} has an empty Token")));
                }
                let mut storer = base.clone();
                if let Some(raw) = &b.custom_settings {
                    storer.apply_custom(raw);
                }
                bots.push(BotSettings {
                    name: b.bot_name.unwrap_or_else(|| format!("bot{idx}")),
                    token: b.token,
                    api_url: api_url.clone(),
                    local_files,
                    storer,
                });
            }
        }

        if bots.is_empty() {
            let token = get("TELEGRAM_BOT_TOKEN").and_then(non_empty).ok_or_else(|| {
                Error::Config(
                    "TELEGRAM_BOT_TOKEN environment variable (or a settings file) is required"
                        .to_string(),
                )
            })?;
            bots.push(BotSettings {
                name: get("STORER_BOT_NAME").unwrap_or_else(|| "storer".to_string()),
                token,
                api_url,
                local_files,
                storer: base,
            });
        }

        Ok(Self { bots })
    }
}

fn base_storer_settings(get: &impl Fn(&str) -> Option<String>) -> StorerSettings {
    let defaults = StorerSettings::default();
    let limits = ContextLimits::default();

    StorerSettings {
        root_dir: get("STORER_ROOT_DIR").and_then(non_empty).map(PathBuf::from),
        allowed_users: parse_user_list(&get("STORER_ALLOWED_USERS").unwrap_or_default()),
        ip_prefix: get("STORER_IP_PREFIX")
            .and_then(non_empty)
            .unwrap_or(defaults.ip_prefix),
        pass_key: get("STORER_PASS_KEY").and_then(non_empty),
        folder_policy: get("STORER_FOLDER_POLICY")
            .and_then(|v| FolderPolicy::parse(&v))
            .unwrap_or_default(),
        context_limits: ContextLimits {
            history_capacity: get("STORER_HISTORY_CAPACITY")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(limits.history_capacity),
            media_group_capacity: get("STORER_MEDIA_GROUP_CAPACITY")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(limits.media_group_capacity),
            idle_ttl: get("STORER_CONTEXT_IDLE_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .or(limits.idle_ttl),
        },
        ffmpeg_path: get("STORER_FFMPEG_PATH")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or(defaults.ffmpeg_path),
        ip_echo_url: get("STORER_IP_ECHO_URL")
            .and_then(non_empty)
            .unwrap_or(defaults.ip_echo_url),
    }
}

/// Comma- or space-separated users; a leading `@` is dropped.
fn parse_user_list(v: &str) -> Vec<String> {
    v.split(|c: char| c == ',' || c.is_whitespace())
        .map(|s| s.trim().trim_start_matches('@'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue; // never override the real environment
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::domain::UserId;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn single_bot_from_env() {
        let cfg = Config::from_lookup(
            lookup(&[
                ("TELEGRAM_BOT_TOKEN", "t"),
                ("STORER_ROOT_DIR", "/srv/videos"),
                ("STORER_ALLOWED_USERS", "@alice, 42 bob"),
                ("STORER_FOLDER_POLICY", "title_with_id"),
                ("STORER_HISTORY_CAPACITY", "5"),
                ("STORER_CONTEXT_IDLE_SECS", "3600"),
            ]),
            None,
        )
        .unwrap();

        assert_eq!(cfg.bots.len(), 1);
        let s = &cfg.bots[0].storer;
        assert_eq!(s.root_dir, Some(PathBuf::from("/srv/videos")));
        assert_eq!(s.allowed_users, vec!["alice", "42", "bob"]);
        assert_eq!(s.folder_policy, FolderPolicy::TitleWithChatId);
        assert_eq!(s.context_limits.history_capacity, 5);
        assert_eq!(s.context_limits.media_group_capacity, 1_000);
        assert_eq!(s.context_limits.idle_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(s.ip_prefix, "/ip");
        assert!(s.pass_key.is_none());
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[]), None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn settings_file_bots_overlay_env_defaults() {
        let json = r#"{
          "BotSettings": [
            { "Token": "a", "BotName": "family", "CustomSettings": "RootDir=/srv/a,AllowedUsers=alice 7,PassKey=sesame" },
            { "Token": "b" }
          ]
        }"#;
        let cfg = Config::from_lookup(
            lookup(&[("STORER_ROOT_DIR", "/srv/default"), ("TELEGRAM_LOCAL_FILES", "yes")]),
            Some(json),
        )
        .unwrap();

        assert_eq!(cfg.bots.len(), 2);
        let a = &cfg.bots[0];
        assert_eq!(a.name, "family");
        assert!(a.local_files);
        assert_eq!(a.storer.root_dir, Some(PathBuf::from("/srv/a")));
        assert_eq!(a.storer.allowed_users, vec!["alice", "7"]);
        assert_eq!(a.storer.pass_key.as_deref(), Some("sesame"));

        let b = &cfg.bots[1];
        assert_eq!(b.name, "bot1");
        assert_eq!(b.storer.root_dir, Some(PathBuf::from("/srv/default")));
    }

    #[test]
    fn bad_settings_json_is_an_error() {
        let err = Config::from_lookup(lookup(&[]), Some("{not json")).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn allow_list_matches_username_or_id() {
        let s = StorerSettings {
            allowed_users: vec!["Alice".to_string(), "42".to_string()],
            ..Default::default()
        };
        let by_name = Sender {
            username: Some("alice".to_string()),
            id: Some(UserId(1)),
        };
        let by_id = Sender {
            username: None,
            id: Some(UserId(42)),
        };
        let stranger = Sender {
            username: Some("mallory".to_string()),
            id: Some(UserId(43)),
        };
        assert!(s.is_allowed(&by_name));
        assert!(s.is_allowed(&by_id));
        assert!(!s.is_allowed(&stranger));
        assert!(!s.is_allowed(&Sender::default()));
    }
}
