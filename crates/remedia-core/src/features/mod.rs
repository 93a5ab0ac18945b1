//! Feature services behind each screen of the application.
//!
//! Every service is built from an [`AppContext`] and reads through the query
//! cache; writes go through [`crate::mutation::Mutation`] so the affected key
//! families are invalidated on success and failures reach the notifier.

mod comments;
mod content;
mod context;
mod health;
mod models;
mod products;
mod profiles;
mod remedies;
mod videos;

pub use comments::CommentService;
pub use content::{Content, ContentService};
pub use context::AppContext;
pub use health::{HealthService, SymptomDraft};
pub use models::{
    Comment, Expert, HealthConcern, NewsArticle, Profile, Remedy, Symptom, Video, VideoStatus,
};
pub use products::{extract_product, ProductMetadata};
pub use profiles::{ProfilePatch, ProfileService};
pub use remedies::{RemedyDraft, RemedyService};
pub use videos::{VideoDraft, VideoService};

/// Where the client should go after a completed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Remedies,
}

impl Navigation {
    pub const fn path(self) -> &'static str {
        match self {
            Self::Remedies => "/remedies",
        }
    }
}
