//! Client configuration.
//!
//! Provides the `ClientConfig` struct used by every front end to discover the
//! Supabase project, the storage bucket for uploads and the query cache policy.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::query::RetryPolicy;
use crate::util::{normalize_base_url, normalize_text_option};
use crate::{Error, Result};

const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
const ENV_SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
const ENV_STORAGE_BUCKET: &str = "REMEDIA_STORAGE_BUCKET";
const DEFAULT_STORAGE_BUCKET: &str = "media";

/// Public, safe-to-ship configuration for the BaaS client.
///
/// Never holds secrets. The anon key is public; row access is enforced
/// server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,
    #[serde(default)]
    pub query: QueryConfig,
}

/// Query cache policy shared by all queries unless overridden per query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    pub stale_time_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub refetch_on_window_focus: bool,
    pub refetch_on_reconnect: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time_ms: 5 * 60 * 1000,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            refetch_on_window_focus: true,
            refetch_on_reconnect: true,
        }
    }
}

impl QueryConfig {
    pub const fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

fn default_storage_bucket() -> String {
    DEFAULT_STORAGE_BUCKET.to_string()
}

impl ClientConfig {
    pub fn new(supabase_url: impl AsRef<str>, supabase_anon_key: impl Into<String>) -> Result<Self> {
        let config = Self {
            supabase_url: supabase_url.as_ref().to_string(),
            supabase_anon_key: supabase_anon_key.into(),
            storage_bucket: default_storage_bucket(),
            query: QueryConfig::default(),
        };
        config.normalized()
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no Supabase variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| std::env::var(key).ok())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!(
                "Failed to read config at {}: {error}",
                path.display()
            ))
        })?;
        let config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!(
                "Failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.normalized()
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(&self.clone().normalized()?)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Base URL of the REST gateway (`/rest/v1`).
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url)
    }

    /// Base URL of the storage API (`/storage/v1`).
    pub fn storage_url(&self) -> String {
        format!("{}/storage/v1", self.supabase_url)
    }

    /// Base URL of the edge functions gateway (`/functions/v1`).
    pub fn functions_url(&self) -> String {
        format!("{}/functions/v1", self.supabase_url)
    }

    fn normalized(mut self) -> Result<Self> {
        self.supabase_url =
            normalize_base_url(&self.supabase_url, "Supabase URL").map_err(Error::Config)?;
        self.supabase_anon_key = self.supabase_anon_key.trim().to_string();
        if self.supabase_anon_key.is_empty() {
            return Err(Error::Config(
                "Supabase anon key must not be empty".to_string(),
            ));
        }
        self.storage_bucket = normalize_text_option(Some(self.storage_bucket))
            .unwrap_or_else(default_storage_bucket);
        Ok(self)
    }
}

fn parse_config(get: impl Fn(&str) -> Option<String>) -> Result<Option<ClientConfig>> {
    let url = normalize_text_option(get(ENV_SUPABASE_URL));
    let anon_key = normalize_text_option(get(ENV_SUPABASE_ANON_KEY));

    let (url, anon_key) = match (url, anon_key) {
        (None, None) => return Ok(None),
        (Some(url), Some(anon_key)) => (url, anon_key),
        _ => {
            return Err(Error::Config(format!(
                "Both {ENV_SUPABASE_URL} and {ENV_SUPABASE_ANON_KEY} must be set"
            )))
        }
    };

    let mut config = ClientConfig::new(url, anon_key)?;
    if let Some(bucket) = normalize_text_option(get(ENV_STORAGE_BUCKET)) {
        config.storage_bucket = bucket;
    }
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<HashMap<_, _>>();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_config_returns_none_without_variables() {
        assert!(parse_config(env_of(&[])).unwrap().is_none());
    }

    #[test]
    fn parse_config_rejects_partial_configuration() {
        let error = parse_config(env_of(&[(ENV_SUPABASE_URL, "https://x.supabase.co")]))
            .unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn parse_config_normalizes_values() {
        let config = parse_config(env_of(&[
            (ENV_SUPABASE_URL, " https://x.supabase.co/ "),
            (ENV_SUPABASE_ANON_KEY, " anon "),
            (ENV_STORAGE_BUCKET, "remedy-images"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.supabase_url, "https://x.supabase.co");
        assert_eq!(config.supabase_anon_key, "anon");
        assert_eq!(config.storage_bucket, "remedy-images");
        assert_eq!(config.rest_url(), "https://x.supabase.co/rest/v1");
    }

    #[test]
    fn config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = ClientConfig::new("https://x.supabase.co", "anon").unwrap();
        config.query.max_retries = 1;

        config.save_to_path(&path).unwrap();
        let loaded = ClientConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn query_config_defaults_fill_missing_fields() {
        let config: QueryConfig = serde_json::from_str(r#"{"max_retries": 0}"#).unwrap();
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.stale_time(), Duration::from_secs(300));
        assert!(config.refetch_on_window_focus);
    }
}
