/*
[INPUT]:  Optional YAML configuration file, MMR_* environment variables
[OUTPUT]: Parsed tracker configuration
[POS]:    Configuration layer - backend, storage and timer settings
[UPDATE]: When adding new configuration options
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File, FileFormat};
use mmr_backend::ClientConfig;
use serde::{Deserialize, Serialize};

use crate::coordinator::{CoordinatorOptions, RetryPolicy};
use crate::state::DEFAULT_SNAPSHOT_KEY;

const ENV_PREFIX: &str = "MMR";
const APP_DIR: &str = "mmr-tracker";

/// Top-level configuration for the tracker
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub timer: TimerConfig,
}

/// Hosted backend connection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Project URL, e.g. "https://xyz.supabase.co"
    #[serde(default)]
    pub url: String,
    /// Public project key sent as the `apikey` header
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Local durable state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory for the timer snapshot, session and logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_snapshot_key")]
    pub snapshot_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            snapshot_key: default_snapshot_key(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_snapshot_key() -> String {
    DEFAULT_SNAPSHOT_KEY.to_string()
}

fn default_tick_interval_ms() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// `<platform data dir>/mmr-tracker`, or `./.mmr-tracker` when unknown
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(format!(".{APP_DIR}")))
}

impl TrackerConfig {
    /// Load from an optional YAML file, then apply `MMR_` environment overrides
    /// such as `MMR_BACKEND__URL`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`TrackerConfig::load`], reading overrides from `env` instead of the
    /// process environment when given.
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );

        builder
            .build()
            .context("read configuration sources")?
            .try_deserialize()
            .context("parse configuration")
    }

    /// Check the settings needed to reach the backend.
    pub fn validate(&self) -> Result<()> {
        if self.backend.url.trim().is_empty() {
            bail!("backend.url is not set (config file or MMR_BACKEND__URL)");
        }
        if self.backend.api_key.trim().is_empty() {
            bail!("backend.api_key is not set (config file or MMR_BACKEND__API_KEY)");
        }
        if self.timer.tick_interval_ms == 0 {
            bail!("timer.tick_interval_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(default_data_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.backend.timeout_secs),
            connect_timeout: Duration::from_secs(self.backend.connect_timeout_secs),
        }
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            tick_interval: Duration::from_millis(self.timer.tick_interval_ms),
            retry: RetryPolicy {
                attempts: self.timer.retry_attempts,
                delay: Duration::from_millis(self.timer.retry_delay_ms),
            },
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("serialize config to YAML")
    }
}
