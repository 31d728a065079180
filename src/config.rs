use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub general: General,
    pub auth: Auth,
    pub storage: Storage,
    pub notify: Notify,
    pub logging: Logging,
}

impl Config {
    pub const FILENAME: &str = "group-queue.toml";
    pub const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        if let Ok(client_id) = std::env::var(Self::CLIENT_ID_ENV) {
            if !client_id.trim().is_empty() {
                config.auth.client_id = client_id.trim().to_string();
            }
        }

        Ok(config)
    }

    /// Startup checks for commands that talk to Spotify.
    pub fn validate(&self) -> Result<()> {
        if self.auth.client_id.is_empty() {
            bail!(
                "No Spotify client id configured. Set auth.client_id in {} or the {} environment variable.",
                Self::FILENAME,
                Self::CLIENT_ID_ENV
            );
        }
        if self.general.poll_interval_ms == 0 {
            bail!("general.poll_interval_ms must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObserveMode {
    /// Query "currently playing" on a fixed interval
    #[default]
    Poll,
    /// Rely on CURRENT_TRACK requests pushed by the host
    Push,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct General {
    pub poll_interval_ms: u64,
    pub mode: ObserveMode,
}

impl General {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for General {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            mode: ObserveMode::Poll,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Auth {
    pub client_id: String,
    pub redirect_uri: String,
    /// Refresh the access token this long before it expires
    pub refresh_margin_secs: i64,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: "http://127.0.0.1:8898/login".to_string(),
            refresh_margin_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Storage {
    pub cache_dir: PathBuf,
    pub groups_file: String,
}

impl Storage {
    pub fn groups_path(&self) -> PathBuf {
        self.cache_dir.join(&self.groups_file)
    }

    pub fn refresh_token_path(&self) -> PathBuf {
        self.cache_dir.join("refresh_token")
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache"),
            groups_file: "groups.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotifyPolicy {
    /// Notify after every expansion, even if some tracks failed to queue
    #[default]
    Always,
    /// Notify only when every track was queued
    FullSuccess,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Notify {
    pub policy: NotifyPolicy,
    pub title: String,
}

impl Default for Notify {
    fn default() -> Self {
        Self {
            policy: NotifyPolicy::Always,
            title: "Spotify Group Shuffle".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Logging {
    pub dir: PathBuf,
    pub filter: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".logs"),
            filter: "spotify_group_queue=debug,rspotify=info,warn".to_string(),
        }
    }
}
