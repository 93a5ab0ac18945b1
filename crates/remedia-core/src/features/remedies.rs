//! Remedy creation and per-user remedy lists.

use std::sync::Arc;

use serde::Serialize;

use super::content::ContentService;
use super::context::AppContext;
use super::models::Remedy;
use super::Navigation;
use crate::backend::{Filter, TableQuery};
use crate::media::{build_object_path, LocalFile};
use crate::query::keys;
use crate::util::normalize_text_option;
use crate::{Error, Result};

const REMEDY_IMAGE_FOLDER: &str = "remedies";

/// Form input for a new remedy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemedyDraft {
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
}

#[derive(Serialize)]
struct NewRemedyRow<'a> {
    name: &'a str,
    description: Option<String>,
    ingredients: Vec<String>,
    image_url: Option<String>,
    user_id: &'a str,
}

pub struct RemedyService {
    ctx: AppContext,
    content: ContentService<Remedy>,
}

impl RemedyService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            ctx: ctx.clone(),
            content: ContentService::new(ctx),
        }
    }

    pub const fn content(&self) -> &ContentService<Remedy> {
        &self.content
    }

    pub async fn list(&self) -> Result<Arc<Vec<Remedy>>> {
        self.content.list().await
    }

    /// Remedies created by `user_id`, keyed `["userRemedies", user_id]`.
    pub async fn user_remedies(&self, user_id: &str) -> Result<Arc<Vec<Remedy>>> {
        let query = TableQuery::default()
            .filter(Filter::eq("user_id", user_id))
            .order_by("created_at", false);
        self.content
            .cached_rows(keys::user_remedies(user_id), query)
            .await
    }

    /// Create a remedy for the signed-in user.
    ///
    /// The image, if any, is uploaded first and the remedy row is inserted
    /// with its public URL. The two steps are not atomic: if the insert
    /// fails the uploaded object stays behind.
    pub async fn create_remedy(
        &self,
        draft: RemedyDraft,
        image: Option<LocalFile>,
    ) -> Result<Navigation> {
        let result = self.try_create(draft, image).await;
        self.ctx.reported("Failed to create remedy", result)
    }

    async fn try_create(&self, draft: RemedyDraft, image: Option<LocalFile>) -> Result<Navigation> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("Remedy name is required"));
        }
        let user = self.ctx.current_user().await?;

        let image_url = match image {
            Some(file) => Some(self.upload_image(file).await?),
            None => None,
        };

        let row = NewRemedyRow {
            name,
            description: normalize_text_option(draft.description),
            ingredients: draft
                .ingredients
                .into_iter()
                .filter_map(|ingredient| normalize_text_option(Some(ingredient)))
                .collect(),
            image_url,
            user_id: &user.id,
        };
        let row = serde_json::to_value(&row)?;

        let created = self
            .ctx
            .mutation("create-remedy")
            .invalidates(keys::remedies())
            .invalidates(keys::all_user_remedies())
            .run(self.ctx.backend.insert("remedies", row))
            .await?;
        tracing::info!(
            remedy_id = created.get("id").and_then(|id| id.as_str()).unwrap_or_default(),
            "Created remedy"
        );
        Ok(Navigation::Remedies)
    }

    async fn upload_image(&self, file: LocalFile) -> Result<String> {
        let content_type = file.mime_type();
        if !content_type.starts_with("image/") {
            return Err(Error::invalid_input(format!(
                "{} is not an image ({content_type})",
                file.file_name
            )));
        }
        let path = build_object_path(REMEDY_IMAGE_FOLDER, &file.file_name);
        let bucket = self.ctx.storage_bucket();
        let stored = self
            .ctx
            .backend
            .upload(bucket, &path, file.bytes, &content_type)
            .await?;
        Ok(self.ctx.backend.public_url(bucket, &stored))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::backend::{BackendCall, CallKind};
    use crate::features::context::testing::harness;

    fn draft() -> RemedyDraft {
        RemedyDraft {
            name: "Ginger tea".to_string(),
            description: Some("  Soothes the throat ".to_string()),
            ingredients: vec!["ginger".to_string(), " ".to_string(), "honey".to_string()],
        }
    }

    #[tokio::test]
    async fn create_with_image_uploads_then_inserts_once_then_invalidates() {
        let h = harness();
        h.backend.sign_in_as("user-1");
        h.ctx.queries.set_query_data(&keys::remedies(), Arc::new(Vec::<Remedy>::new()));
        h.ctx
            .queries
            .set_query_data(&keys::user_remedies("user-1"), Arc::new(Vec::<Remedy>::new()));
        let image = LocalFile::new("Ginger Tea.PNG", vec![1, 2, 3]);

        let navigation = RemedyService::new(&h.ctx)
            .create_remedy(draft(), Some(image))
            .await
            .unwrap();

        assert_eq!(navigation, Navigation::Remedies);
        assert_eq!(navigation.path(), "/remedies");
        let calls = h
            .backend
            .calls()
            .into_iter()
            .filter(|call| call.kind() != CallKind::Session)
            .collect::<Vec<_>>();
        assert_eq!(calls.len(), 2);

        let BackendCall::Upload { bucket, path, size, content_type } = &calls[0] else {
            panic!("expected upload first, got {:?}", calls[0]);
        };
        assert_eq!(bucket, "media");
        assert!(path.starts_with("remedies/") && path.ends_with("-ginger-tea.png"));
        assert_eq!(*size, 3);
        assert_eq!(content_type, "image/png");

        let BackendCall::Insert { table, row } = &calls[1] else {
            panic!("expected insert second, got {:?}", calls[1]);
        };
        assert_eq!(table, "remedies");
        assert_eq!(
            row["image_url"],
            json!(format!("https://storage.memory.local/media/{path}"))
        );
        assert_eq!(row["user_id"], "user-1");
        assert_eq!(row["description"], "Soothes the throat");
        assert_eq!(row["ingredients"], json!(["ginger", "honey"]));

        assert!(h.ctx.queries.is_stale(&keys::remedies()));
        assert!(h.ctx.queries.is_stale(&keys::user_remedies("user-1")));
    }

    #[tokio::test]
    async fn create_without_image_inserts_null_image_url() {
        let h = harness();
        h.backend.sign_in_as("user-1");

        RemedyService::new(&h.ctx)
            .create_remedy(draft(), None)
            .await
            .unwrap();

        assert_eq!(h.backend.count_calls(CallKind::Upload), 0);
        assert_eq!(h.backend.rows("remedies")[0]["image_url"], json!(null));
    }

    #[tokio::test]
    async fn failed_upload_skips_insert_and_toasts() {
        let h = harness();
        h.backend.sign_in_as("user-1");
        h.backend
            .fail_next(CallKind::Upload, Error::Storage("bucket full".to_string()));

        let error = RemedyService::new(&h.ctx)
            .create_remedy(draft(), Some(LocalFile::new("a.jpg", vec![9])))
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Storage(_)));
        assert_eq!(h.backend.count_calls(CallKind::Insert), 0);
        assert_eq!(h.notifier.toasts()[0].title, "Failed to create remedy");
    }

    #[tokio::test]
    async fn failed_insert_leaves_uploaded_object() {
        let h = harness();
        h.backend.sign_in_as("user-1");
        h.backend.fail_next(CallKind::Insert, Error::http(500, "db down"));

        let result = RemedyService::new(&h.ctx)
            .create_remedy(draft(), Some(LocalFile::new("a.jpg", vec![9])))
            .await;

        assert!(result.is_err());
        let uploaded = h
            .backend
            .calls()
            .into_iter()
            .find_map(|call| match call {
                BackendCall::Upload { path, .. } => Some(path),
                _ => None,
            })
            .unwrap();
        assert_eq!(h.backend.object(&uploaded), Some(vec![9]));
        assert_eq!(h.backend.rows("remedies").len(), 0);
    }

    #[tokio::test]
    async fn create_requires_session_and_name() {
        let h = harness();
        let service = RemedyService::new(&h.ctx);

        let unnamed = service
            .create_remedy(RemedyDraft::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(unnamed, Error::InvalidInput(_)));

        let anonymous = service.create_remedy(draft(), None).await.unwrap_err();
        assert!(matches!(anonymous, Error::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn user_remedies_filters_by_owner() {
        let h = harness();
        h.backend.seed(
            "remedies",
            [
                json!({"id": "r1", "name": "Tea", "user_id": "user-1"}),
                json!({"id": "r2", "name": "Balm", "user_id": "user-2"}),
            ],
        );

        let mine = RemedyService::new(&h.ctx)
            .user_remedies("user-1")
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, "r1");
    }
}
