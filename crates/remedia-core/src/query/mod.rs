//! Keyed query cache.
//!
//! Every read in the application goes through a [`QueryClient`] under a
//! [`QueryKey`]. Results are cached, deduplicated across concurrent readers,
//! revalidated when stale, and invalidated by mutations.

mod client;
mod retry;

use std::fmt;

pub use client::{QueryClient, QueryObserver, QueryOptions, QueryState};
pub use retry::RetryPolicy;

/// One component of a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    Bool(bool),
    Null,
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => write!(f, "{value:?}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// Identity of a cached query: an ordered tuple of key parts.
///
/// Invalidation matches by prefix, so `["remedies"]` covers
/// `["remedies", "detail", "42"]` as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(root: &str) -> Self {
        Self(vec![KeyPart::from(root)])
    }

    #[must_use]
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, part) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str("]")
    }
}

/// Typed key builders, one per query family.
pub mod keys {
    use super::QueryKey;

    pub const SESSION: &str = "session";
    pub const IS_ADMIN: &str = "is-admin";

    pub fn session() -> QueryKey {
        QueryKey::new(SESSION)
    }

    pub fn is_admin(user_id: &str) -> QueryKey {
        QueryKey::new(IS_ADMIN).with(user_id)
    }

    /// List key of a content family, e.g. `["experts"]`.
    pub fn list(root: &str) -> QueryKey {
        QueryKey::new(root)
    }

    pub fn search(root: &str, column: &str, term: &str) -> QueryKey {
        QueryKey::new(root)
            .with("search")
            .with(column)
            .with(term.trim().to_lowercase())
    }

    /// First `limit` rows of a family, optionally narrowed by a search term.
    pub fn page(root: &str, search: Option<&str>, limit: usize) -> QueryKey {
        QueryKey::new(root)
            .with("page")
            .with(search.map(|term| term.trim().to_lowercase()))
            .with(i64::try_from(limit).unwrap_or(i64::MAX))
    }

    pub fn detail(root: &str, id: &str) -> QueryKey {
        QueryKey::new(root).with("detail").with(id)
    }

    pub fn remedies() -> QueryKey {
        QueryKey::new("remedies")
    }

    pub fn user_remedies(user_id: &str) -> QueryKey {
        QueryKey::new("userRemedies").with(user_id)
    }

    /// Prefix covering every user's remedy list.
    pub fn all_user_remedies() -> QueryKey {
        QueryKey::new("userRemedies")
    }

    pub fn latest_videos() -> QueryKey {
        QueryKey::new("videos").with("latest")
    }

    pub fn admin_symptoms(search: &str) -> QueryKey {
        QueryKey::new("admin-symptoms").with(search.trim())
    }

    pub fn all_admin_symptoms() -> QueryKey {
        QueryKey::new("admin-symptoms")
    }

    pub fn profile(user_id: &str) -> QueryKey {
        QueryKey::new("profile").with(user_id)
    }

    pub fn admin_users(search: &str) -> QueryKey {
        QueryKey::new("admin-users").with(search.trim())
    }

    pub fn all_admin_users() -> QueryKey {
        QueryKey::new("admin-users")
    }

    pub fn comments(entity: &str, entity_id: &str) -> QueryKey {
        QueryKey::new("comments").with(entity).with(entity_id)
    }
}
