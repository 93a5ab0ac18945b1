//! The signed-in user's profile and the admin user directory.

use std::sync::Arc;

use serde::Serialize;

use super::content::{Content, ContentService};
use super::context::AppContext;
use super::models::Profile;
use crate::backend::{decode_rows, Filter, TableQuery};
use crate::query::keys;
use crate::util::normalize_text_option;
use crate::{Error, Result};

const ADMIN_USERS_LIMIT: usize = 50;

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfilePatch {
    fn normalized(self) -> Self {
        Self {
            full_name: self.full_name.map(|value| value.trim().to_string()),
            avatar_url: self.avatar_url.map(|value| value.trim().to_string()),
            bio: self.bio.map(|value| value.trim().to_string()),
        }
    }

    const fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.avatar_url.is_none() && self.bio.is_none()
    }
}

pub struct ProfileService {
    ctx: AppContext,
    content: ContentService<Profile>,
}

impl ProfileService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            ctx: ctx.clone(),
            content: ContentService::new(ctx),
        }
    }

    /// Profile of the signed-in user, keyed `["profile", user_id]`.
    pub async fn current_profile(&self) -> Result<Option<Profile>> {
        let user = self.ctx.current_user().await?;
        let query = TableQuery::default()
            .filter(Filter::eq("id", user.id.as_str()))
            .limit(1);
        let rows = self
            .content
            .cached_rows(keys::profile(&user.id), query)
            .await?;
        Ok(rows.first().cloned())
    }

    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<Profile> {
        let patch = patch.normalized();
        if patch.is_empty() {
            return Err(Error::invalid_input("Nothing to update"));
        }
        if patch.full_name.as_deref() == Some("") {
            return Err(Error::invalid_input("Name must not be empty"));
        }
        let user = self.ctx.current_user().await?;
        let patch = serde_json::to_value(&patch)?;
        let filters = [Filter::eq("id", user.id.as_str())];

        let result = self
            .ctx
            .mutation("update-profile")
            .invalidates(keys::profile(&user.id))
            .invalidates(keys::list(Profile::KEY_ROOT))
            .invalidates(keys::all_admin_users())
            .run(async {
                let rows = self
                    .ctx
                    .backend
                    .update(Profile::TABLE, &filters, patch)
                    .await?;
                decode_rows::<Profile>(rows)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::http(404, "Profile not found"))
            })
            .await;
        self.ctx.reported("Failed to update profile", result)
    }

    /// Admin user search by name, keyed `["admin-users", search]`.
    pub async fn admin_users(&self, search: &str) -> Result<Arc<Vec<Profile>>> {
        let mut query = TableQuery::default()
            .order_by("full_name", true)
            .limit(ADMIN_USERS_LIMIT);
        if let Some(term) = normalize_text_option(Some(search.to_string())) {
            query = query.filter(Filter::contains(Profile::SEARCH_COLUMN, &term));
        }
        self.content
            .cached_rows(keys::admin_users(search), query)
            .await
    }
}
