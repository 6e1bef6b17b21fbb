//! External download operation
//!
//! The orchestrator never talks to the network itself. It hands a
//! [`FetchRequest`] to a [`MediaFetcher`], receives progress through a
//! callback, and gets back either output file paths or a classified
//! [`FetchError`]. [`YtDlpFetcher`] is the production implementation shelling
//! out to yt-dlp; tests substitute a scripted mock.

use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::FetcherConfig;
use crate::error::{Error, FetchError, FetchErrorKind};

/// Progress callback: `(fraction, eta_seconds, raw_line) -> keep_going`
///
/// `fraction` is the raw value reported by the tool (may exceed 1.0 briefly),
/// `eta_seconds` is -1 when unknown. A `false` return asks the fetcher to
/// stop; the in-flight attempt is then abandoned.
pub type ProgressFn = Arc<dyn Fn(f64, i64, &str) -> bool + Send + Sync>;

/// Metadata learned by probing a URL without downloading
#[derive(Clone, Debug, Default)]
pub struct MediaMetadata {
    /// Media title, if the source exposed one
    pub title: Option<String>,
    /// Thumbnail URL, if the source exposed one
    pub thumbnail_url: Option<String>,
}

/// One fetch attempt
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// Source media URL
    pub url: String,
    /// Format selector expression for this attempt
    pub selector: String,
    /// Directory output files land in
    pub download_dir: PathBuf,
}

/// The external download operation behind the orchestrator
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Run one download attempt to completion, cancellation, or failure
    async fn fetch(
        &self,
        request: FetchRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> std::result::Result<Vec<PathBuf>, FetchError>;

    /// Look up title and thumbnail for a URL without downloading
    async fn probe(&self, url: &str) -> std::result::Result<MediaMetadata, FetchError>;
}

// e.g. "[download]  42.3% of 120.5MiB at 3.2MiB/s ETA 01:23"
#[allow(clippy::expect_used)]
static PROGRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").expect("static regex"));

#[allow(clippy::expect_used)]
static ETA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ETA (?:(\d+):)?(\d{1,2}):(\d{2})").expect("static regex"));

// "[download] Destination: path" or "[Merger] Merging formats into \"path\""
#[allow(clippy::expect_used)]
static DESTINATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:\[download\] Destination: (.+)|\[Merger\] Merging formats into "(.+)")"#)
        .expect("static regex")
});

/// Parse a yt-dlp output line into `(fraction, eta_seconds)` if it is a
/// progress report
fn parse_progress_line(line: &str) -> Option<(f64, i64)> {
    let percent: f64 = PROGRESS_RE.captures(line)?.get(1)?.as_str().parse().ok()?;
    let eta = ETA_RE
        .captures(line)
        .and_then(|caps| {
            let hours: i64 = caps.get(1).map_or(Some(0), |m| m.as_str().parse().ok())?;
            let minutes: i64 = caps.get(2)?.as_str().parse().ok()?;
            let seconds: i64 = caps.get(3)?.as_str().parse().ok()?;
            Some(hours * 3600 + minutes * 60 + seconds)
        })
        .unwrap_or(-1);
    Some((percent / 100.0, eta))
}

/// Parse an output-file path out of a destination or merger line
fn parse_destination_line(line: &str) -> Option<PathBuf> {
    let caps = DESTINATION_RE.captures(line)?;
    let path = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

/// Production fetcher shelling out to the yt-dlp binary
pub struct YtDlpFetcher {
    binary: PathBuf,
    config: FetcherConfig,
}

impl YtDlpFetcher {
    /// Create a fetcher, discovering the yt-dlp binary on PATH unless the
    /// configuration names one explicitly
    pub fn new(config: FetcherConfig) -> crate::error::Result<Self> {
        let binary = match &config.ytdlp_path {
            Some(path) => path.clone(),
            None => which::which("yt-dlp").map_err(|e| Error::Config {
                message: format!("yt-dlp binary not found on PATH: {e}"),
                key: Some("fetcher.ytdlp_path".to_string()),
            })?,
        };
        debug!(binary = %binary.display(), "Using yt-dlp binary");
        Ok(Self { binary, config })
    }

    /// Assemble the argument list for one download attempt
    fn build_args(&self, request: &FetchRequest) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            request.selector.clone(),
            "-o".to_string(),
            self.config.output_template.clone(),
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-cache-dir".to_string(),
            "--user-agent".to_string(),
            self.config.user_agent.clone(),
            "--retries".to_string(),
            self.config.retries.to_string(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout.to_string(),
        ];
        if self.config.force_ipv4 {
            args.push("--force-ipv4".to_string());
        }
        if self.config.geo_bypass {
            args.push("--geo-bypass".to_string());
        }
        if self.config.write_auto_subs {
            args.push("--write-auto-sub".to_string());
        }
        if let Some(cookies) = &self.config.cookies_file {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        request: FetchRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> std::result::Result<Vec<PathBuf>, FetchError> {
        tokio::fs::create_dir_all(&request.download_dir)
            .await
            .map_err(|e| {
                FetchError::new(
                    FetchErrorKind::Storage,
                    format!("cannot create download directory: {e}"),
                )
            })?;

        let args = self.build_args(&request);
        debug!(url = %request.url, selector = %request.selector, "Spawning yt-dlp");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .current_dir(&request.download_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::unknown(format!("failed to spawn yt-dlp: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::unknown("yt-dlp stdout not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::unknown("yt-dlp stderr not captured"))?;

        // Collect stderr in the background for error classification
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.ok();
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut output_files = Vec::new();
        let mut interrupted = false;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(url = %request.url, "Cancellation requested, killing yt-dlp");
                    child.start_kill().ok();
                    interrupted = true;
                    break;
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            trace!(line = %line, "yt-dlp output");
                            if let Some(path) = parse_destination_line(&line) {
                                output_files.push(request.download_dir.join(path));
                            }
                            if let Some((fraction, eta)) = parse_progress_line(&line)
                                && !progress(fraction, eta, &line)
                            {
                                debug!(url = %request.url, "Progress callback asked to stop");
                                child.start_kill().ok();
                                interrupted = true;
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            warn!(error = %e, "Error reading yt-dlp output");
                            break;
                        }
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| FetchError::unknown(format!("failed to wait for yt-dlp: {e}")))?;
        let stderr_text = stderr_task.await.unwrap_or_default();

        if interrupted {
            return Err(FetchError::unknown("download interrupted"));
        }
        if !status.success() {
            return Err(FetchError::classify(stderr_text));
        }

        output_files.sort();
        output_files.dedup();
        Ok(output_files)
    }

    async fn probe(&self, url: &str) -> std::result::Result<MediaMetadata, FetchError> {
        let output = Command::new(&self.binary)
            .args([
                "--dump-single-json",
                "--skip-download",
                "--no-playlist",
                "--no-warnings",
                url,
            ])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| FetchError::unknown(format!("failed to spawn yt-dlp: {e}")))?;

        if !output.status.success() {
            return Err(FetchError::classify(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| FetchError::unknown(format!("unparseable yt-dlp metadata: {e}")))?;

        Ok(MediaMetadata {
            title: value
                .get("title")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            thumbnail_url: value
                .get("thumbnail")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}
