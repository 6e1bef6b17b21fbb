//! Format selection and the bounded fallback policy
//!
//! A [`FormatSpec`] names the quality the caller wants and renders to the
//! selector expression the external tool understands. When a fetch fails
//! because the selection matched nothing, [`FormatSpec::next_fallback`]
//! decides the single degraded retry the orchestrator is allowed.

use serde::{Deserialize, Serialize};

/// Quality preference for a download
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "quality", content = "height")]
pub enum FormatSpec {
    /// Best available quality, preferring 1080p and above
    Best,
    /// At least the given height in pixels (e.g. 1080, 720)
    AtLeast(u32),
}

/// Height the fallback policy degrades to
const FALLBACK_HEIGHT: u32 = 720;

impl FormatSpec {
    /// Render the yt-dlp format selector expression for this spec
    ///
    /// Each expression is itself a preference chain: the tool tries the
    /// alternatives left to right, so a missing exact match degrades inside
    /// a single invocation before the orchestrator-level fallback kicks in.
    pub fn selector(&self) -> String {
        match self {
            FormatSpec::Best => {
                "bestvideo[height>=1080]+bestaudio/bestvideo+bestaudio/best".to_string()
            }
            FormatSpec::AtLeast(h) => format!(
                "bestvideo[height>={h}]+bestaudio/bestvideo[height={h}]+bestaudio/best[height>={h}]/best"
            ),
        }
    }

    /// The degraded spec to retry with, if any
    ///
    /// `attempt` is the number of fetch attempts already made for this task.
    /// Exactly one fallback is ever allowed: after the first failed attempt a
    /// request above 720p degrades to 720p; a 720p-or-lower request, or any
    /// second failure, gets no further retry.
    pub fn next_fallback(&self, attempt: u32) -> Option<FormatSpec> {
        if attempt >= 2 {
            return None;
        }
        match self {
            FormatSpec::Best => Some(FormatSpec::AtLeast(FALLBACK_HEIGHT)),
            FormatSpec::AtLeast(h) if *h > FALLBACK_HEIGHT => {
                Some(FormatSpec::AtLeast(FALLBACK_HEIGHT))
            }
            FormatSpec::AtLeast(_) => None,
        }
    }
}

impl std::fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatSpec::Best => write!(f, "best"),
            FormatSpec::AtLeast(h) => write!(f, "{h}p"),
        }
    }
}

impl std::str::FromStr for FormatSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("best") {
            return Ok(FormatSpec::Best);
        }
        let digits = s.strip_suffix('p').unwrap_or(s);
        digits
            .parse::<u32>()
            .map(FormatSpec::AtLeast)
            .map_err(|_| format!("unrecognized format spec: {s}"))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn best_selector_prefers_1080_and_up() {
        assert_eq!(
            FormatSpec::Best.selector(),
            "bestvideo[height>=1080]+bestaudio/bestvideo+bestaudio/best"
        );
    }

    #[test]
    fn at_least_selector_interpolates_height() {
        assert_eq!(
            FormatSpec::AtLeast(1080).selector(),
            "bestvideo[height>=1080]+bestaudio/bestvideo[height=1080]+bestaudio/best[height>=1080]/best"
        );
        assert_eq!(
            FormatSpec::AtLeast(720).selector(),
            "bestvideo[height>=720]+bestaudio/bestvideo[height=720]+bestaudio/best[height>=720]/best"
        );
    }

    #[test]
    fn best_falls_back_to_720_once() {
        assert_eq!(
            FormatSpec::Best.next_fallback(1),
            Some(FormatSpec::AtLeast(720))
        );
    }

    #[test]
    fn high_requests_fall_back_to_720() {
        assert_eq!(
            FormatSpec::AtLeast(1080).next_fallback(1),
            Some(FormatSpec::AtLeast(720))
        );
        assert_eq!(
            FormatSpec::AtLeast(2160).next_fallback(1),
            Some(FormatSpec::AtLeast(720))
        );
    }

    #[test]
    fn seven_twenty_has_no_fallback() {
        assert_eq!(FormatSpec::AtLeast(720).next_fallback(1), None);
        assert_eq!(FormatSpec::AtLeast(480).next_fallback(1), None);
    }

    #[test]
    fn no_fallback_after_two_attempts() {
        assert_eq!(FormatSpec::Best.next_fallback(2), None);
        assert_eq!(FormatSpec::AtLeast(1080).next_fallback(3), None);
    }

    #[test]
    fn parses_common_spellings() {
        assert_eq!(FormatSpec::from_str("best").unwrap(), FormatSpec::Best);
        assert_eq!(FormatSpec::from_str("Best").unwrap(), FormatSpec::Best);
        assert_eq!(
            FormatSpec::from_str("1080p").unwrap(),
            FormatSpec::AtLeast(1080)
        );
        assert_eq!(
            FormatSpec::from_str("720").unwrap(),
            FormatSpec::AtLeast(720)
        );
        assert!(FormatSpec::from_str("ultra").is_err());
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(FormatSpec::Best.to_string(), "best");
        assert_eq!(FormatSpec::AtLeast(720).to_string(), "720p");
        assert_eq!(
            FormatSpec::from_str(&FormatSpec::AtLeast(1080).to_string()).unwrap(),
            FormatSpec::AtLeast(1080)
        );
    }
}
