//! Comment threads attached to remedies, articles and videos.

use std::sync::Arc;

use serde_json::json;

use super::content::{Content, ContentService};
use super::context::AppContext;
use super::models::Comment;
use crate::backend::{Filter, TableQuery};
use crate::query::keys;
use crate::{Error, Result};

const MAX_COMMENT_CHARS: usize = 2000;

pub struct CommentService {
    ctx: AppContext,
    content: ContentService<Comment>,
}

impl CommentService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            ctx: ctx.clone(),
            content: ContentService::new(ctx),
        }
    }

    /// Oldest-first thread for one entity.
    pub async fn list(&self, entity_type: &str, entity_id: &str) -> Result<Arc<Vec<Comment>>> {
        let (column, ascending) = Comment::ORDER_BY;
        let query = TableQuery::default()
            .filter(Filter::eq("entity_type", entity_type))
            .filter(Filter::eq("entity_id", entity_id))
            .order_by(column, ascending);
        self.content
            .cached_rows(keys::comments(entity_type, entity_id), query)
            .await
    }

    pub async fn add_comment(
        &self,
        entity_type: &str,
        entity_id: &str,
        content: &str,
    ) -> Result<Comment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::invalid_input("Comment must not be empty"));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(Error::invalid_input(format!(
                "Comment must be at most {MAX_COMMENT_CHARS} characters"
            )));
        }
        let user = self.ctx.current_user().await?;

        let result = self
            .ctx
            .mutation("add-comment")
            .invalidates(keys::comments(entity_type, entity_id))
            .run(async {
                let stored = self
                    .ctx
                    .backend
                    .insert(
                        Comment::TABLE,
                        json!({
                            "entity_type": entity_type,
                            "entity_id": entity_id,
                            "user_id": user.id,
                            "content": content,
                        }),
                    )
                    .await?;
                Ok(serde_json::from_value::<Comment>(stored)?)
            })
            .await;
        self.ctx.reported("Failed to post comment", result)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::features::context::testing::harness;

    #[tokio::test]
    async fn thread_is_scoped_to_entity_and_refreshed_after_posting() {
        let h = harness();
        h.backend.sign_in_as("user-1");
        let comments = CommentService::new(&h.ctx);

        assert!(comments.list("remedy", "r1").await.unwrap().is_empty());
        comments.list("remedy", "r2").await.unwrap();

        let posted = comments
            .add_comment("remedy", "r1", "  Worked for me ")
            .await
            .unwrap();
        assert_eq!(posted.content, "Worked for me");
        assert_eq!(posted.user_id, "user-1");

        assert!(h.ctx.queries.is_stale(&keys::comments("remedy", "r1")));
        assert!(!h.ctx.queries.is_stale(&keys::comments("remedy", "r2")));
    }

    #[tokio::test]
    async fn anonymous_users_cannot_comment() {
        let h = harness();
        let error = CommentService::new(&h.ctx)
            .add_comment("video", "v1", "Nice")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn oversized_comment_is_rejected() {
        let h = harness();
        h.backend.sign_in_as("user-1");
        let error = CommentService::new(&h.ctx)
            .add_comment("video", "v1", &"a".repeat(MAX_COMMENT_CHARS + 1))
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }
}
