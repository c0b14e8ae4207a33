//! calwatch configuration.
//!
//! Loaded from `~/.config/calwatch/config.toml` (or an explicit path) and
//! overlaid with `CALWATCH_*` environment variables, e.g.
//! `CALWATCH_CONCURRENCY=8` or `CALWATCH_MIRROR__DIR=/srv/mirror`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::diff::{DEFAULT_VOLATILE_PROPERTIES, Detector, FieldDiffer, Normalizer};
use crate::error::{WatchError, WatchResult};
use crate::event::EventField;
use crate::filter::Blacklist;

static DEFAULT_STATE_DIR: &str = "~/.local/share/calwatch";
static DEFAULT_COMMIT_MESSAGE: &str = "Update calendars";

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

fn default_concurrency() -> usize {
    4
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_volatile_properties() -> Vec<String> {
    DEFAULT_VOLATILE_PROPERTIES
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_commit_message() -> String {
    DEFAULT_COMMIT_MESSAGE.to_string()
}

fn default_gotify_priority() -> u8 {
    5
}

#[derive(Deserialize, Clone, Debug)]
pub struct WatchConfig {
    /// Last filtered version of every source, compared against on the next run
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Changed filtered calendars are copied here for an external web server
    pub serving_dir: Option<PathBuf>,

    /// Sources processed at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Property names stripped before the line gate
    #[serde(default = "default_volatile_properties")]
    pub volatile_properties: Vec<String>,

    /// Extra event fields to leave out of comparison
    #[serde(default)]
    pub ignore_fields: Vec<EventField>,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    pub mirror: Option<MirrorConfig>,

    pub notifications: Option<NotificationConfig>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SourceConfig {
    pub name: Option<String>,
    pub url: Url,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct MirrorConfig {
    pub dir: PathBuf,
    /// Commit changed files with git after writing them
    #[serde(default)]
    pub git: bool,
    /// Push after committing (credentials come from the git setup)
    #[serde(default)]
    pub push: bool,
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
    /// Committer identity. Without it git falls back to the host's user config.
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct NotificationConfig {
    pub gotify: Option<GotifyConfig>,
    pub email: Option<EmailConfig>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GotifyConfig {
    pub server: Url,
    pub token: String,
    #[serde(default = "default_gotify_priority")]
    pub priority: u8,
}

#[derive(Deserialize, Clone, Debug)]
pub struct EmailConfig {
    /// Relay host, reached over TLS on the submission port
    pub smtp_server: String,
    pub username: String,
    pub password: String,
    pub recipients: Vec<String>,
    /// Sender mailbox. Defaults to `username`.
    pub from: Option<String>,
}

impl WatchConfig {
    pub fn config_path() -> WatchResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| WatchError::Config("Could not determine config directory".into()))?
            .join("calwatch");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path` (or the default location) plus environment overrides.
    pub fn load(path: Option<&Path>) -> WatchResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !path.exists() {
            return Err(WatchError::Config(format!(
                "Config file {} not found. Create one with `calwatch init`.",
                path.display()
            )));
        }

        let config: WatchConfig = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix("CALWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| WatchError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| WatchError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> WatchResult<Self> {
        let config: WatchConfig =
            toml::from_str(content).map_err(|e| WatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> WatchResult<()> {
        if self.concurrency == 0 {
            return Err(WatchError::Config("concurrency must be at least 1".into()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            let name = source.name()?;
            if !seen.insert(name.clone()) {
                return Err(WatchError::Config(format!(
                    "Two sources are named '{name}'. Set `name` on one of them."
                )));
            }
        }
        Ok(())
    }

    pub fn state_dir(&self) -> PathBuf {
        expand_path(&self.state_dir)
    }

    pub fn serving_dir(&self) -> Option<PathBuf> {
        self.serving_dir.as_deref().map(expand_path)
    }

    pub fn detector(&self) -> Detector {
        Detector::new(
            Normalizer::new(&self.volatile_properties),
            FieldDiffer::with_ignored(self.ignore_fields.iter().copied()),
        )
    }

    /// Write a commented starter config.
    pub fn create_default_config(path: &Path) -> WatchResult<()> {
        let contents = format!(
            "\
# calwatch configuration

# Previous versions of each calendar:
# state_dir = \"{DEFAULT_STATE_DIR}\"

# Copy changed calendars here for a web server:
# serving_dir = \"/srv/calendars\"

# concurrency = 4
# fetch_timeout_secs = 30

# [[sources]]
# url = \"https://example.com/timetable.ics\"
# name = \"timetable\"
# blacklist = [\"Tutorial\"]

# [mirror]
# dir = \"~/calendar-mirror\"
# git = true
# push = false
# author_name = \"calwatch\"
# author_email = \"calwatch@example.com\"

# [notifications.gotify]
# server = \"https://gotify.example.com\"
# token = \"...\"

# [notifications.email]
# smtp_server = \"smtp.example.com\"
# username = \"calwatch@example.com\"
# password = \"...\"
# recipients = [\"me@example.com\"]
"
        );

        if path.exists() {
            return Err(WatchError::Config(format!(
                "{} already exists",
                path.display()
            )));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                WatchError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| WatchError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

impl SourceConfig {
    /// Configured name, or the last URL path segment without its extension.
    pub fn name(&self) -> WatchResult<String> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }

        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(|last| last.split('.').next().unwrap_or(last))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                WatchError::Config(format!(
                    "Cannot derive a name from '{}'. Set `name` for this source.",
                    self.url
                ))
            })
    }

    pub fn blacklist(&self) -> Blacklist {
        Blacklist::new(&self.blacklist)
    }
}

impl MirrorConfig {
    pub fn dir(&self) -> PathBuf {
        expand_path(&self.dir)
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
