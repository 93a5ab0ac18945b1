//! Media helpers: URL classification, thumbnails, image processing and
//! upload paths. Everything here is pure except [`LocalFile::read`].

mod processing;
mod upload;
mod youtube;

use url::Url;

pub use processing::{compress_image, crop_image, CropRect, ImageOptions, OutputFormat, ProcessedImage};
pub use upload::{build_object_path, infer_mime_type, sanitize_token, LocalFile};
pub use youtube::{youtube_thumbnail_url, youtube_video_id};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "ogv", "mov", "m4v", "avi", "mkv"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "bmp", "svg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Image,
    YouTube,
    Unknown,
}

impl MediaType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::YouTube => "youtube",
            Self::Unknown => "unknown",
        }
    }
}

/// Classify a media URL by hostname, then by path extension.
pub fn classify_url(raw: &str) -> MediaType {
    let raw = raw.trim();
    if raw.is_empty() {
        return MediaType::Unknown;
    }

    let path = match Url::parse(raw) {
        Ok(url) => {
            if url.host_str().is_some_and(is_youtube_host) {
                return MediaType::YouTube;
            }
            url.path().to_string()
        }
        // Relative paths and bare file names.
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    let extension = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, extension)| extension.to_ascii_lowercase());
    match extension.as_deref() {
        Some(extension) if VIDEO_EXTENSIONS.contains(&extension) => MediaType::Video,
        Some(extension) if IMAGE_EXTENSIONS.contains(&extension) => MediaType::Image,
        _ => MediaType::Unknown,
    }
}

fn is_youtube_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    host == "youtu.be" || host == "youtube.com" || host.ends_with(".youtube.com")
}

/// Preview image for a media URL: the YouTube thumbnail, the image itself,
/// or `fallback` when neither applies.
pub fn thumbnail_url(url: &str, fallback: Option<&str>) -> Option<String> {
    match classify_url(url) {
        MediaType::YouTube => youtube_thumbnail_url(url).or_else(|| fallback.map(str::to_string)),
        MediaType::Image => Some(url.trim().to_string()),
        MediaType::Video | MediaType::Unknown => fallback.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn classifies_by_host_then_extension() {
        assert_eq!(
            classify_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            MediaType::YouTube
        );
        assert_eq!(classify_url("https://youtu.be/dQw4w9WgXcQ"), MediaType::YouTube);
        assert_eq!(classify_url("https://m.youtube.com/shorts/x"), MediaType::YouTube);
        assert_eq!(
            classify_url("https://cdn.example.com/clips/intro.MP4?token=1#t=3"),
            MediaType::Video
        );
        assert_eq!(classify_url("https://cdn.example.com/a/leaf.webp"), MediaType::Image);
        assert_eq!(classify_url("uploads/photo.JPEG?size=2"), MediaType::Image);
        assert_eq!(classify_url("https://example.com/article"), MediaType::Unknown);
        assert_eq!(classify_url("https://example.com/file.pdf"), MediaType::Unknown);
        assert_eq!(classify_url(""), MediaType::Unknown);
    }

    #[test]
    fn lookalike_hosts_are_not_youtube() {
        assert_eq!(
            classify_url("https://notyoutube.com/watch.mp4"),
            MediaType::Video
        );
    }

    #[test]
    fn thumbnail_prefers_youtube_then_image_then_fallback() {
        assert_eq!(
            thumbnail_url("https://youtu.be/dQw4w9WgXcQ", None).as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );
        assert_eq!(
            thumbnail_url("https://cdn.example.com/a.png", Some("default.png")).as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(
            thumbnail_url("https://cdn.example.com/a.mp4", Some("default.png")).as_deref(),
            Some("default.png")
        );
        assert_eq!(thumbnail_url("https://youtube.com/channel/abc", None), None);
    }
}
