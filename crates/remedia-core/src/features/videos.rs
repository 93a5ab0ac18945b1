//! Videos: the unified save path, the "latest" shelf and its toggle.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::content::{Content, ContentService};
use super::context::AppContext;
use super::models::{Video, VideoStatus};
use crate::backend::{decode_rows, Filter, TableQuery};
use crate::media::{build_object_path, classify_url, youtube_thumbnail_url, LocalFile, MediaType};
use crate::mutation::Settled;
use crate::query::keys;
use crate::util::normalize_text_option;
use crate::{Error, Result};

const LATEST_LIMIT: usize = 12;

/// Form input for creating or editing a video.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoDraft {
    /// Set when editing an existing video.
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    /// External or previously uploaded video URL.
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: VideoStatus,
    pub show_in_latest: bool,
}

#[derive(Debug, Default)]
struct UploadedMedia {
    video_url: Option<String>,
    thumbnail_url: Option<String>,
    urls: Vec<String>,
}

pub struct VideoService {
    ctx: AppContext,
    content: ContentService<Video>,
}

impl VideoService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            ctx: ctx.clone(),
            content: ContentService::new(ctx),
        }
    }

    pub const fn content(&self) -> &ContentService<Video> {
        &self.content
    }

    pub async fn list(&self) -> Result<Arc<Vec<Video>>> {
        self.content.list().await
    }

    /// Published videos flagged for the "latest" shelf, newest first.
    pub async fn latest_videos(&self) -> Result<Arc<Vec<Video>>> {
        let query = TableQuery::default()
            .filter(Filter::eq("show_in_latest", true))
            .filter(Filter::eq("status", "published"))
            .order_by("created_at", false)
            .limit(LATEST_LIMIT);
        self.content
            .cached_rows(keys::latest_videos(), query)
            .await
    }

    /// Flip a video's "show in latest" flag.
    ///
    /// The cached list updates immediately. When toggles overlap, only the
    /// response to the most recent one is applied, so the cache ends on the
    /// last value the user picked whatever order the responses arrive in.
    pub async fn set_show_in_latest(&self, id: &str, value: bool) -> Result<Settled<Video>> {
        let intent = self.ctx.intents.begin(&format!("video-latest:{id}"));
        let filters = [Filter::eq("id", id)];
        let backend = self.ctx.backend.clone();

        let result = self
            .ctx
            .mutation("toggle-video-latest")
            .invalidates(keys::list(Video::KEY_ROOT))
            .run_intent(
                &intent,
                &keys::list(Video::KEY_ROOT),
                |videos: &Vec<Video>| {
                    videos
                        .iter()
                        .cloned()
                        .map(|mut video| {
                            if video.id == id {
                                video.show_in_latest = value;
                            }
                            video
                        })
                        .collect()
                },
                async move {
                    let rows = backend
                        .update(Video::TABLE, &filters, json!({ "show_in_latest": value }))
                        .await?;
                    decode_rows::<Video>(rows)?
                        .into_iter()
                        .next()
                        .ok_or_else(|| Error::http(404, format!("video {id} not found")))
                },
            )
            .await;
        self.ctx.reported("Failed to update video", result)
    }

    /// Create or update a video from a draft and any number of local files.
    ///
    /// Files are uploaded first. The first uploaded video becomes the video
    /// URL unless the draft already has one, and the first uploaded image
    /// becomes the thumbnail. Without an image the thumbnail is derived from
    /// a YouTube URL. Drafts may be saved incomplete; publishing requires a
    /// video source.
    pub async fn save_video(&self, draft: VideoDraft, files: Vec<LocalFile>) -> Result<Video> {
        let result = self.try_save(draft, files).await;
        self.ctx.reported("Failed to save video", result)
    }

    async fn try_save(&self, draft: VideoDraft, files: Vec<LocalFile>) -> Result<Video> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(Error::invalid_input("Video title is required"));
        }
        let draft_video_url = normalize_text_option(draft.video_url.clone());
        let has_video_file = files.iter().any(LocalFile::is_video);
        if draft.status == VideoStatus::Published && draft_video_url.is_none() && !has_video_file {
            return Err(Error::invalid_input(
                "A published video needs a video URL or an uploaded video file",
            ));
        }
        if let Some(url) = draft_video_url.as_deref() {
            if classify_url(url) == MediaType::Image {
                return Err(Error::invalid_input(format!("{url} is an image, not a video")));
            }
        }

        let user = self.ctx.current_user().await?;
        let uploaded = self.upload_all(&user.id, files).await?;

        let video_url = draft_video_url.or(uploaded.video_url);
        let thumbnail_url = normalize_text_option(draft.thumbnail_url)
            .or(uploaded.thumbnail_url)
            .or_else(|| video_url.as_deref().and_then(youtube_thumbnail_url));

        let mut row = Map::new();
        row.insert("title".to_string(), json!(title));
        row.insert(
            "description".to_string(),
            json!(normalize_text_option(draft.description)),
        );
        row.insert("video_url".to_string(), json!(video_url));
        row.insert("thumbnail_url".to_string(), json!(thumbnail_url));
        row.insert("status".to_string(), serde_json::to_value(draft.status)?);
        row.insert("show_in_latest".to_string(), json!(draft.show_in_latest));
        if !uploaded.urls.is_empty() {
            row.insert("media_urls".to_string(), json!(uploaded.urls));
        }

        let saved = match normalize_text_option(draft.id) {
            Some(id) => self.content.try_update(&id, Value::Object(row)).await?,
            None => {
                row.insert("user_id".to_string(), json!(user.id));
                self.content.try_create(&Value::Object(row)).await?
            }
        };
        tracing::info!(video_id = %saved.id, status = ?saved.status, "Saved video");
        Ok(saved)
    }

    async fn upload_all(&self, user_id: &str, files: Vec<LocalFile>) -> Result<UploadedMedia> {
        let bucket = self.ctx.storage_bucket();
        let folder = format!("videos/{user_id}");
        let mut uploaded = UploadedMedia::default();

        for file in files {
            let content_type = file.mime_type();
            let is_video = content_type.starts_with("video/");
            let is_image = content_type.starts_with("image/");
            if !is_video && !is_image {
                return Err(Error::invalid_input(format!(
                    "{} is neither a video nor an image ({content_type})",
                    file.file_name
                )));
            }

            let path = build_object_path(&folder, &file.file_name);
            let stored = self
                .ctx
                .backend
                .upload(bucket, &path, file.bytes, &content_type)
                .await?;
            let url = self.ctx.backend.public_url(bucket, &stored);

            if is_video && uploaded.video_url.is_none() {
                uploaded.video_url = Some(url.clone());
            }
            if is_image && uploaded.thumbnail_url.is_none() {
                uploaded.thumbnail_url = Some(url.clone());
            }
            uploaded.urls.push(url);
        }
        Ok(uploaded)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::{BackendCall, CallKind};
    use crate::features::context::testing::harness;

    fn seed_video(h: &crate::features::context::testing::Harness, show_in_latest: bool) {
        h.backend.seed(
            "videos",
            [json!({
                "id": "v1",
                "title": "Breathing basics",
                "status": "published",
                "show_in_latest": show_in_latest,
                "created_at": "2026-02-01T08:00:00Z"
            })],
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_toggles_end_on_last_intent_even_if_responses_reorder() {
        let h = harness();
        seed_video(&h, false);
        let videos = VideoService::new(&h.ctx);
        videos.list().await.unwrap();
        h.backend.clear_calls();

        // The first write answers after the second one.
        h.backend
            .delay_next(CallKind::Update, Duration::from_millis(200));
        let (first, second) = tokio::join!(
            videos.set_show_in_latest("v1", true),
            videos.set_show_in_latest("v1", false),
        );

        assert_eq!(first.unwrap(), Settled::Superseded);
        assert!(matches!(second.unwrap(), Settled::Applied(video) if !video.show_in_latest));

        let patches = h
            .backend
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Update { patch, .. } => Some(patch["show_in_latest"].clone()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(patches, vec![json!(true), json!(false)]);

        let cached = h
            .ctx
            .queries
            .get_query_data::<Vec<Video>>(&keys::list("videos"))
            .unwrap();
        assert!(!cached[0].show_in_latest);
        assert_eq!(h.backend.rows("videos")[0]["show_in_latest"], false);
    }

    #[tokio::test]
    async fn failed_toggle_rolls_back_cached_list() {
        let h = harness();
        seed_video(&h, false);
        let videos = VideoService::new(&h.ctx);
        videos.list().await.unwrap();
        h.backend
            .fail_next(CallKind::Update, Error::http(403, "not allowed"));

        let error = videos.set_show_in_latest("v1", true).await.unwrap_err();

        assert_eq!(error.status(), Some(403));
        let cached = h
            .ctx
            .queries
            .get_query_data::<Vec<Video>>(&keys::list("videos"))
            .unwrap();
        assert!(!cached[0].show_in_latest);
        assert_eq!(h.notifier.toasts()[0].title, "Failed to update video");
    }

    #[tokio::test]
    async fn latest_videos_only_lists_published_flagged_rows() {
        let h = harness();
        h.backend.seed(
            "videos",
            [
                json!({"id": "a", "title": "A", "status": "published", "show_in_latest": true}),
                json!({"id": "b", "title": "B", "status": "draft", "show_in_latest": true}),
                json!({"id": "c", "title": "C", "status": "published", "show_in_latest": false}),
            ],
        );

        let latest = VideoService::new(&h.ctx).latest_videos().await.unwrap();
        assert_eq!(
            latest.iter().map(|video| video.id.as_str()).collect::<Vec<_>>(),
            vec!["a"]
        );
    }

    #[tokio::test]
    async fn save_youtube_video_derives_thumbnail() {
        let h = harness();
        h.backend.sign_in_as("user-1");

        let saved = VideoService::new(&h.ctx)
            .save_video(
                VideoDraft {
                    title: "Yoga for sleep".to_string(),
                    video_url: Some("https://youtu.be/dQw4w9WgXcQ".to_string()),
                    status: VideoStatus::Published,
                    ..VideoDraft::default()
                },
                Vec::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            saved.thumbnail_url.as_deref(),
            Some("https://img.youtube.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
        );
        assert_eq!(saved.user_id.as_deref(), Some("user-1"));
        assert_eq!(saved.status, VideoStatus::Published);
    }

    #[tokio::test]
    async fn save_uploads_every_file_and_picks_video_and_thumbnail() {
        let h = harness();
        h.backend.sign_in_as("user-1");
        let files = vec![
            LocalFile::new("cover.jpg", vec![1]),
            LocalFile::new("clip one.mp4", vec![2, 2]),
            LocalFile::new("clip-two.webm", vec![3]),
        ];

        let saved = VideoService::new(&h.ctx)
            .save_video(
                VideoDraft {
                    title: "Herbal walk".to_string(),
                    status: VideoStatus::Published,
                    ..VideoDraft::default()
                },
                files,
            )
            .await
            .unwrap();

        assert_eq!(h.backend.count_calls(CallKind::Upload), 3);
        assert_eq!(saved.media_urls.len(), 3);
        assert!(saved.video_url.as_deref().unwrap().ends_with("-clip-one.mp4"));
        assert!(saved.thumbnail_url.as_deref().unwrap().ends_with("-cover.jpg"));
        assert!(saved.video_url.unwrap().contains("/videos/user-1/"));
    }

    #[tokio::test]
    async fn files_with_colliding_names_upload_to_distinct_paths() {
        let h = harness();
        h.backend.sign_in_as("user-1");
        let files = vec![
            LocalFile::new("clip.mp4", vec![1]),
            LocalFile::new("Clip.MP4", vec![2]),
        ];

        let saved = VideoService::new(&h.ctx)
            .save_video(
                VideoDraft {
                    title: "Two takes".to_string(),
                    status: VideoStatus::Published,
                    ..VideoDraft::default()
                },
                files,
            )
            .await
            .unwrap();

        let paths = h
            .backend
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Upload { path, .. } => Some(path),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(paths.len(), 2);
        assert_ne!(paths[0], paths[1]);
        assert_eq!(saved.media_urls.len(), 2);
        assert!(h.notifier.toasts().is_empty());
    }

    #[tokio::test]
    async fn draft_can_be_saved_without_source_but_publish_cannot() {
        let h = harness();
        h.backend.sign_in_as("user-1");
        let service = VideoService::new(&h.ctx);
        let draft = VideoDraft {
            title: "Work in progress".to_string(),
            ..VideoDraft::default()
        };

        let saved = service.save_video(draft.clone(), Vec::new()).await.unwrap();
        assert_eq!(saved.status, VideoStatus::Draft);
        assert_eq!(saved.video_url, None);

        let error = service
            .save_video(
                VideoDraft {
                    id: Some(saved.id.clone()),
                    status: VideoStatus::Published,
                    ..draft
                },
                Vec::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn editing_updates_existing_row() {
        let h = harness();
        h.backend.sign_in_as("user-1");
        seed_video(&h, true);

        let saved = VideoService::new(&h.ctx)
            .save_video(
                VideoDraft {
                    id: Some("v1".to_string()),
                    title: "Breathing, revised".to_string(),
                    video_url: Some("https://cdn.example.com/breathing.mp4".to_string()),
                    status: VideoStatus::Published,
                    show_in_latest: true,
                    ..VideoDraft::default()
                },
                Vec::new(),
            )
            .await
            .unwrap();

        assert_eq!(saved.id, "v1");
        assert_eq!(saved.title, "Breathing, revised");
        assert_eq!(h.backend.rows("videos").len(), 1);
        assert_eq!(h.backend.count_calls(CallKind::Insert), 0);
    }
}
