//! YouTube video id extraction and thumbnail derivation.

use std::sync::OnceLock;

use regex::Regex;

const VIDEO_ID_PATTERN: &str = r"(?:youtube\.com/(?:watch\?(?:[^#\s]*&)?v=|embed/|shorts/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)";

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VIDEO_ID_PATTERN).expect("Invalid regex"))
}

/// Extract the 11-character video id from a YouTube URL.
///
/// Accepts `watch?v=`, `youtu.be/`, `embed/`, `shorts/` and `v/` forms.
pub fn youtube_video_id(url: &str) -> Option<String> {
    video_id_regex()
        .captures(url.trim())
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
}

/// Deterministic thumbnail for a YouTube URL.
pub fn youtube_thumbnail_url(url: &str) -> Option<String> {
    youtube_video_id(url).map(|id| format!("https://img.youtube.com/vi/{id}/hqdefault.jpg"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn extracts_id_from_supported_forms() {
        for url in [
            format!("https://www.youtube.com/watch?v={ID}"),
            format!("https://youtube.com/watch?feature=share&v={ID}&t=42"),
            format!("https://youtu.be/{ID}"),
            format!("https://youtu.be/{ID}?si=abc"),
            format!("https://www.youtube.com/embed/{ID}"),
            format!("https://youtube.com/shorts/{ID}"),
            format!("https://www.youtube.com/v/{ID}#t=1"),
            format!("  https://m.youtube.com/watch?v={ID}  "),
        ] {
            assert_eq!(youtube_video_id(&url).as_deref(), Some(ID), "{url}");
        }
    }

    #[test]
    fn rejects_non_matching_urls() {
        for url in [
            "https://vimeo.com/123456789",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQextra",
            "https://www.youtube.com/channel/UC1234567890",
            "https://example.com/youtu.be",
            "",
        ] {
            assert_eq!(youtube_video_id(url), None, "{url}");
        }
    }

    #[test]
    fn thumbnail_uses_high_quality_default() {
        assert_eq!(
            youtube_thumbnail_url(&format!("https://youtu.be/{ID}")).as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );
        assert_eq!(youtube_thumbnail_url("https://example.com/clip.mp4"), None);
    }
}
