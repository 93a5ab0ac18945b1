//! Row types for the content tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::Content;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expert {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Content for Expert {
    const TABLE: &'static str = "experts";
    const KEY_ROOT: &'static str = "experts";
    const SEARCH_COLUMN: &'static str = "full_name";

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.full_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remedy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Content for Remedy {
    const TABLE: &'static str = "remedies";
    const KEY_ROOT: &'static str = "remedies";
    const RELATED_KEYS: &'static [&'static str] = &["userRemedies"];

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Content for NewsArticle {
    const TABLE: &'static str = "news_articles";
    const KEY_ROOT: &'static str = "news";
    const SEARCH_COLUMN: &'static str = "title";

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.title
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    #[serde(default)]
    pub status: VideoStatus,
    #[serde(default)]
    pub show_in_latest: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Content for Video {
    const TABLE: &'static str = "videos";
    const KEY_ROOT: &'static str = "videos";
    const SEARCH_COLUMN: &'static str = "title";

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.title
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthConcern {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Content for HealthConcern {
    const TABLE: &'static str = "health_concerns";
    const KEY_ROOT: &'static str = "health-concerns";

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptom {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Content for Symptom {
    const TABLE: &'static str = "symptoms";
    const KEY_ROOT: &'static str = "symptoms";
    const RELATED_KEYS: &'static [&'static str] = &["admin-symptoms"];
    const ORDER_BY: (&'static str, bool) = ("name", true);

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same as the auth user id.
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Content for Profile {
    const TABLE: &'static str = "profiles";
    const KEY_ROOT: &'static str = "profiles";
    const SEARCH_COLUMN: &'static str = "full_name";
    const RELATED_KEYS: &'static [&'static str] = &["profile", "admin-users"];

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Content for Comment {
    const TABLE: &'static str = "comments";
    const KEY_ROOT: &'static str = "comments";
    const SEARCH_COLUMN: &'static str = "content";
    const ORDER_BY: (&'static str, bool) = ("created_at", true);

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.content
    }
}
