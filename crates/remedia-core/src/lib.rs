//! remedia-core - Core library for Remedia
//!
//! Client-side data layer for the Remedia natural-remedies platform: the
//! backend boundary, a keyed query cache with invalidation, mutations, the
//! route access guard, media helpers and the feature services built on them.

pub mod backend;
pub mod config;
pub mod error;
pub mod features;
pub mod gesture;
pub mod guard;
pub mod media;
pub mod mutation;
pub mod notify;
pub mod query;
pub mod theme;
pub mod util;

pub use error::{Error, ErrorKind, Result};
