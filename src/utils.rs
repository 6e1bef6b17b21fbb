//! Small helpers shared across the crate

/// Format a remaining-seconds estimate for display
///
/// Produces `h:mm:ss` when an hour or more remains, `mm:ss` below that, and an
/// empty string for negative (unknown) estimates.
pub fn format_eta(seconds: i64) -> String {
    if seconds < 0 {
        return String::new();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Extract the YouTube video id from a watch or short-link URL
///
/// Handles the two link shapes users paste: `watch?v=<id>` and `youtu.be/<id>`.
/// Returns `None` for anything else; callers fall back to probing.
pub fn extract_video_id(url: &str) -> Option<&str> {
    if let Some(idx) = url.find("watch?v=") {
        let rest = &url[idx + "watch?v=".len()..];
        let end = rest.find(['&', '#']).unwrap_or(rest.len());
        let id = &rest[..end];
        return (!id.is_empty()).then_some(id);
    }
    if let Some(idx) = url.find("youtu.be/") {
        let rest = &url[idx + "youtu.be/".len()..];
        let end = rest.find(['?', '&', '#']).unwrap_or(rest.len());
        let id = &rest[..end];
        return (!id.is_empty()).then_some(id);
    }
    None
}

/// Default thumbnail URL derived from a YouTube video id
pub fn default_thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/0.jpg")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_eta_uses_minutes_seconds_below_an_hour() {
        assert_eq!(format_eta(0), "00:00");
        assert_eq!(format_eta(59), "00:59");
        assert_eq!(format_eta(125), "02:05");
        assert_eq!(format_eta(3599), "59:59");
    }

    #[test]
    fn format_eta_includes_hours_when_needed() {
        assert_eq!(format_eta(3600), "1:00:00");
        assert_eq!(format_eta(3661), "1:01:01");
        assert_eq!(format_eta(7325), "2:02:05");
    }

    #[test]
    fn format_eta_is_empty_for_unknown() {
        assert_eq!(format_eta(-1), "");
    }

    #[test]
    fn extract_video_id_handles_watch_urls() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=abc123&t=42"),
            Some("abc123")
        );
    }

    #[test]
    fn extract_video_id_handles_short_links() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://youtu.be/abc123?t=9"),
            Some("abc123")
        );
    }

    #[test]
    fn extract_video_id_rejects_other_urls() {
        assert_eq!(extract_video_id("https://example.com/video"), None);
        assert_eq!(extract_video_id("https://youtu.be/"), None);
    }

    #[test]
    fn default_thumbnail_points_at_id() {
        assert_eq!(
            default_thumbnail_url("abc123"),
            "https://img.youtube.com/vi/abc123/0.jpg"
        );
    }
}
