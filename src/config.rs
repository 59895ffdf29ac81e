use crate::plan::SyncMode;
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // path to database file
    pub db_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Tracks per add/remove call and longest block per reorder call (max 100).
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    // Retry behaviour for transient API failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Owner of created playlists; looked up via /me when unset.
    #[serde(default)]
    pub spotify_user_id: Option<String>,
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("label-playlist-sync").join("logs"))
        .unwrap_or_else(|| "/var/log/label-playlist-sync".into())
}
fn default_max_batch_size() -> usize { 100 }
fn default_max_retries() -> u32 { 10 }
fn default_retry_base_delay_ms() -> u64 { 1000 }
fn default_request_timeout() -> u64 { 60 }

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        if cfg.max_batch_size == 0 || cfg.max_batch_size > 100 {
            anyhow::bail!("max_batch_size must be between 1 and 100, got {}", cfg.max_batch_size);
        }
        Ok(cfg)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_base_delay_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
