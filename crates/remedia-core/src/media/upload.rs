//! Local files picked for upload and their storage paths.

use std::fmt;
use std::path::Path;

use uuid::Uuid;

use crate::util::unix_timestamp_millis;
use crate::{Error, Result};

/// A file selected on the client, not yet uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub file_name: String,
    /// Content type reported by the picker, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("LocalFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl LocalFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::invalid_input(format!("{} has no file name", path.display())))?
            .to_string();
        Ok(Self::new(file_name, bytes))
    }

    pub fn mime_type(&self) -> String {
        infer_mime_type(self.content_type.as_deref(), &self.file_name)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type().starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type().starts_with("video/")
    }
}

/// Pick a MIME type from the reported content type and the file extension.
///
/// A generic reported type (`application/octet-stream`, or `text/*` for a
/// file whose extension says media) loses to the extension guess.
pub fn infer_mime_type(content_type: Option<&str>, file_name: &str) -> String {
    let extension_guess = mime_guess::from_path(file_name)
        .first_raw()
        .map(str::to_string);

    if let Some(reported) = content_type.map(str::trim).filter(|value| !value.is_empty()) {
        let normalized = reported.to_ascii_lowercase();
        let generic = normalized == "application/octet-stream"
            || (normalized.starts_with("text/")
                && extension_guess.as_deref().is_some_and(is_media_mime_type));
        if !generic {
            return normalized;
        }
    }

    extension_guess.unwrap_or_else(|| "application/octet-stream".to_string())
}

fn is_media_mime_type(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
        || mime_type.starts_with("video/")
        || mime_type.starts_with("audio/")
}

/// Storage path for an upload:
/// `<folder>/<unix millis>-<random token>-<sanitized name>`.
///
/// The token keeps paths distinct for files picked together whose names
/// sanitize to the same value.
pub fn build_object_path(folder: &str, file_name: &str) -> String {
    object_path_at(folder, file_name, unix_timestamp_millis(), &unique_token())
}

/// Eight hex digits from the random tail of a v7 UUID.
fn unique_token() -> String {
    let id = Uuid::now_v7().simple().to_string();
    id[id.len() - 8..].to_string()
}

fn object_path_at(folder: &str, file_name: &str, timestamp_millis: i64, token: &str) -> String {
    let trimmed = file_name.trim();
    let (stem, extension) = trimmed.rsplit_once('.').unwrap_or((trimmed, ""));

    let stem = Some(sanitize_token(stem))
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "file".to_string());
    let extension = sanitize_token(extension);
    let name = if extension.is_empty() {
        stem
    } else {
        format!("{stem}.{extension}")
    };

    let folder = folder
        .split('/')
        .map(sanitize_token)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    let file = format!("{timestamp_millis}-{token}-{name}");
    if folder.is_empty() {
        file
    } else {
        format!("{folder}/{file}")
    }
}

/// Lowercase ASCII alphanumerics with single dashes in between.
pub fn sanitize_token(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = false;

    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn reported_type_wins_unless_generic() {
        assert_eq!(infer_mime_type(Some("Image/PNG"), "photo.jpg"), "image/png");
        assert_eq!(
            infer_mime_type(Some("application/octet-stream"), "clip.mp4"),
            "video/mp4"
        );
        assert_eq!(infer_mime_type(Some("text/plain"), "photo.jpeg"), "image/jpeg");
        assert_eq!(infer_mime_type(Some("text/plain"), "notes.txt"), "text/plain");
        assert_eq!(infer_mime_type(None, "mystery"), "application/octet-stream");
    }

    #[test]
    fn object_path_is_sanitized_and_timestamped() {
        assert_eq!(
            object_path_at("remedies", "My Ginger Tea!.JPG", 1_700_000_000_000, "0a1b2c3d"),
            "remedies/1700000000000-0a1b2c3d-my-ginger-tea.jpg"
        );
        assert_eq!(
            object_path_at("videos/User 1", "..", 5, "ff"),
            "videos/user-1/5-ff-file"
        );
        assert_eq!(object_path_at("", "clip", 7, "ab"), "7-ab-clip");
    }

    #[test]
    fn build_object_path_uses_folder_prefix() {
        let path = build_object_path("remedies", "photo.png");
        assert!(path.starts_with("remedies/"));
        assert!(path.ends_with("-photo.png"));
    }

    #[test]
    fn same_sanitized_name_gets_distinct_paths() {
        let first = build_object_path("videos/user-1", "clip.mp4");
        let second = build_object_path("videos/user-1", "Clip.MP4");
        assert!(first.ends_with("-clip.mp4"));
        assert!(second.ends_with("-clip.mp4"));
        assert_ne!(first, second);
    }

    #[test]
    fn local_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.webp");
        std::fs::write(&path, b"bytes").unwrap();

        let file = LocalFile::read(&path).unwrap();
        assert_eq!(file.file_name, "leaf.webp");
        assert_eq!(file.mime_type(), "image/webp");
        assert!(file.is_image());
    }
}
