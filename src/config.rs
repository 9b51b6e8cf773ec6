//! Pipeline configuration.
//!
//! Layered lowest precedence first: [`PipelineConfig::default`], an optional
//! JSON file, then environment variables. CLI flags are applied on top by the
//! binary.
//!
//! ```json
//! {
//!   "chunk_size": 50000,
//!   "flush": "end-of-stream",
//!   "output_dir": "docs",
//!   "download": { "timeout_secs": 120 }
//! }
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_FEED_URL: &str = "https://www.wienerlinien.at/ogd_realtime/doku/ogd/gtfs/gtfs.zip";
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

pub const ENV_FEED_URL: &str = "GTFS_FEED_URL";
pub const ENV_CHUNK_SIZE: &str = "GTFS_CHUNK_SIZE";

/// When accumulated trips are handed to the direction resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPolicy {
    /// After every batch, holding back only the trip the batch ended on.
    /// A trip that reappears later is merged with its earlier calls and
    /// offered again.
    #[default]
    PerChunk,
    /// Once, after the whole table has been read. Exact for any row order.
    EndOfStream,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub attempts: u32,
    pub backoff_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            connect_timeout_secs: 10,
            attempts: 3,
            backoff_secs: 2,
        }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Delay before retry number `attempt` (1-based), growing linearly.
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_secs.saturating_mul(attempt as u64))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub flush: FlushPolicy,
    pub output_dir: PathBuf,
    pub summary_csv: Option<PathBuf>,
    pub feed_url: String,
    pub download: DownloadConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            flush: FlushPolicy::default(),
            output_dir: PathBuf::from("data"),
            summary_csv: Some(PathBuf::from("data/runs.csv")),
            feed_url: DEFAULT_FEED_URL.to_string(),
            download: DownloadConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Applies `GTFS_FEED_URL` and `GTFS_CHUNK_SIZE` from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env`](Self::apply_env) with an explicit variable lookup.
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(ENV_FEED_URL).filter(|u| !u.trim().is_empty()) {
            self.feed_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_CHUNK_SIZE) {
            self.chunk_size = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_CHUNK_SIZE} must be a positive integer, got '{raw}'"))?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than zero");
        }
        if self.download.attempts == 0 {
            bail!("download.attempts must be at least 1");
        }
        if self.feed_url.trim().is_empty() {
            bail!("feed_url must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_size, 100_000);
        assert_eq!(config.flush, FlushPolicy::PerChunk);
        assert_eq!(config.download.timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let path = std::env::temp_dir().join(format!(
            "gtfs_directions_config_{}.json",
            std::process::id()
        ));
        fs::write(
            &path,
            r#"{"chunk_size": 500, "flush": "end-of-stream", "download": {"attempts": 5}}"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.flush, FlushPolicy::EndOfStream);
        assert_eq!(config.download.attempts, 5);
        assert_eq!(config.download.timeout_secs, 60);
        assert_eq!(config.output_dir, PathBuf::from("data"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let config = PipelineConfig::default()
            .apply_env_from(env(&[
                (ENV_FEED_URL, "http://localhost/feed.zip"),
                (ENV_CHUNK_SIZE, " 250 "),
            ]))
            .unwrap();
        assert_eq!(config.feed_url, "http://localhost/feed.zip");
        assert_eq!(config.chunk_size, 250);
    }

    #[test]
    fn test_bad_env_chunk_size_is_an_error() {
        let result = PipelineConfig::default().apply_env_from(env(&[(ENV_CHUNK_SIZE, "lots")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let config = PipelineConfig {
            chunk_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_size"));
    }

    #[test]
    fn test_backoff_grows_linearly() {
        let download = DownloadConfig::default();
        assert_eq!(download.backoff(1), Duration::from_secs(2));
        assert_eq!(download.backoff(3), Duration::from_secs(6));
    }
}
