use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::snapshot::store::{SnapshotCache, DEFAULT_ARRIVAL_FILE, DEFAULT_DEPARTURE_FILE};

pub const WEBHOOK_ENV: &str = "DISCORD_WEBHOOK_URL";
const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub airport: AirportConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirportConfig {
    #[serde(default = "default_airport_code")]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Number of consecutive days fetched, starting today.
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_departure_file")]
    pub departure_file: String,
    #[serde(default = "default_arrival_file")]
    pub arrival_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub discord_webhook: String,
    #[serde(default)]
    pub enable_stdout: bool,
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub airport: Option<String>,
    pub days: Option<u32>,
    pub cache_dir: Option<String>,
    pub discord_webhook: Option<String>,
    pub enable_stdout: Option<bool>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/cargo-schedule-watch/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    /// A non-empty `DISCORD_WEBHOOK_URL` wins over the file value.
    pub fn apply_env(&mut self) {
        if let Ok(webhook) = std::env::var(WEBHOOK_ENV) {
            if !webhook.trim().is_empty() {
                self.notify.discord_webhook = webhook.trim().to_string();
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(airport) = overrides.airport {
            self.airport.code = airport;
        }
        if let Some(days) = overrides.days {
            self.schedule.days = days;
        }
        if let Some(cache_dir) = overrides.cache_dir {
            self.storage.cache_dir = cache_dir;
        }
        if let Some(webhook) = overrides.discord_webhook {
            self.notify.discord_webhook = webhook;
        }
        if let Some(enable_stdout) = overrides.enable_stdout {
            self.notify.enable_stdout = enable_stdout;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    /// Copy with the webhook URL masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.notify.discord_webhook.trim().is_empty() {
            copy.notify.discord_webhook = REDACTED.to_string();
        }
        copy
    }

    pub fn resolved_cache_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.cache_dir)
    }

    pub fn snapshot_cache(&self) -> SnapshotCache {
        SnapshotCache::new(
            self.resolved_cache_dir(),
            self.storage.departure_file.clone(),
            self.storage.arrival_file.clone(),
        )
    }

    pub fn has_delivery_target(&self) -> bool {
        !self.notify.discord_webhook.trim().is_empty() || self.notify.enable_stdout
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.schedule.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.schedule.timeout_secs.max(1))
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.notify.webhook_timeout_secs.max(1))
    }

    pub fn default_template() -> String {
        let template = r#"[airport]
code = "NGO"

[schedule]
days = 7
request_delay_ms = 2000
timeout_secs = 30

[storage]
cache_dir = "~/.local/share/cargo-schedule-watch"
departure_file = "last_departure_cache.json"
arrival_file = "last_arrival_cache.json"

[notify]
# DISCORD_WEBHOOK_URL in the environment or .env takes precedence.
discord_webhook = ""
enable_stdout = false
webhook_timeout_secs = 10
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for AirportConfig {
    fn default() -> Self {
        Self {
            code: default_airport_code(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            request_delay_ms: default_request_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            departure_file: default_departure_file(),
            arrival_file: default_arrival_file(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            discord_webhook: String::new(),
            enable_stdout: false,
            webhook_timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

fn default_airport_code() -> String {
    "NGO".to_string()
}

fn default_days() -> u32 {
    7
}

fn default_request_delay_ms() -> u64 {
    2_000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_cache_dir() -> String {
    "~/.local/share/cargo-schedule-watch".to_string()
}

fn default_departure_file() -> String {
    DEFAULT_DEPARTURE_FILE.to_string()
}

fn default_arrival_file() -> String {
    DEFAULT_ARRIVAL_FILE.to_string()
}

fn default_webhook_timeout_secs() -> u64 {
    10
}
