//! Configuration for media-dl
//!
//! All fields have sensible defaults, so `Config::default()` is a working
//! starting point. Deserialization accepts partial documents thanks to the
//! per-field serde defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory downloads are written to
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Path of the JSON history file
    #[serde(default = "default_history_path")]
    pub history_path: PathBuf,

    /// Maximum number of downloads transferring at once; excess submissions queue
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Minimum milliseconds between progress events for one task
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Seconds a completed or failed task stays visible before eviction
    #[serde(default = "default_retention_window_secs")]
    pub retention_window_secs: u64,

    /// External tool options
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_history_path() -> PathBuf {
    PathBuf::from("downloads/history.json")
}

fn default_max_concurrent_downloads() -> usize {
    3
}

fn default_progress_interval_ms() -> u64 {
    500
}

fn default_retention_window_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            history_path: default_history_path(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            progress_interval_ms: default_progress_interval_ms(),
            retention_window_secs: default_retention_window_secs(),
            fetcher: FetcherConfig::default(),
        }
    }
}

impl Config {
    /// Progress throttle interval as a `Duration`
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Retention grace window as a `Duration`
    pub fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_window_secs)
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config {
                message: "max_concurrent_downloads must be at least 1".to_string(),
                key: Some("max_concurrent_downloads".to_string()),
            });
        }
        if self.progress_interval_ms == 0 {
            return Err(Error::Config {
                message: "progress_interval_ms must be positive".to_string(),
                key: Some("progress_interval_ms".to_string()),
            });
        }
        if self.download_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "download_dir must not be empty".to_string(),
                key: Some("download_dir".to_string()),
            });
        }
        self.fetcher.validate()?;
        Ok(())
    }
}

/// Options for the external yt-dlp tool
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Explicit path to the yt-dlp binary; discovered on PATH when unset
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Browser user agent presented to the remote site
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Force IPv4 connections (avoids throttled IPv6 routes on some networks)
    #[serde(default = "default_true")]
    pub force_ipv4: bool,

    /// Route around geo restrictions where the tool can
    #[serde(default = "default_true")]
    pub geo_bypass: bool,

    /// Per-fragment retry count passed to the tool
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Socket timeout in seconds passed to the tool
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout: u32,

    /// Netscape-format cookies file for authenticated or bot-checked sources
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    /// Also fetch auto-generated subtitles
    #[serde(default = "default_true")]
    pub write_auto_subs: bool,

    /// Output filename template
    #[serde(default = "default_output_template")]
    pub output_template: String,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/94.0.4606.81 Safari/537.36"
        .to_string()
}

fn default_true() -> bool {
    true
}

fn default_retries() -> u32 {
    10
}

fn default_socket_timeout() -> u32 {
    30
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            user_agent: default_user_agent(),
            force_ipv4: default_true(),
            geo_bypass: default_true(),
            retries: default_retries(),
            socket_timeout: default_socket_timeout(),
            cookies_file: None,
            write_auto_subs: default_true(),
            output_template: default_output_template(),
        }
    }
}

impl FetcherConfig {
    fn validate(&self) -> Result<()> {
        if self.output_template.is_empty() {
            return Err(Error::Config {
                message: "output_template must not be empty".to_string(),
                key: Some("fetcher.output_template".to_string()),
            });
        }
        if self.socket_timeout == 0 {
            return Err(Error::Config {
                message: "socket_timeout must be positive".to_string(),
                key: Some("fetcher.socket_timeout".to_string()),
            });
        }
        Ok(())
    }
}
