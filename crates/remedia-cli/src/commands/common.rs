use std::path::Path;
use std::sync::Arc;

use remedia_core::backend::SupabaseBackend;
use remedia_core::features::AppContext;

use crate::auth::KeyringSessionStore;
use crate::error::CliError;
use crate::paths::resolve_client_config;

pub type CliBackend = SupabaseBackend<KeyringSessionStore>;

/// Backend plus application context for the resolved config.
pub fn connect(config_path: Option<&Path>) -> Result<(CliBackend, AppContext), CliError> {
    let config = resolve_client_config(config_path)?;
    let store = KeyringSessionStore::new(&config.supabase_url);
    let backend = SupabaseBackend::new(config.clone(), store)?;
    let ctx = AppContext::new(Arc::new(backend.clone()), config);
    Ok((backend, ctx))
}

pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(index, _)| &id[..index])
}

pub fn normalize_search(search: Option<&str>) -> Result<Option<String>, CliError> {
    match search {
        None => Ok(None),
        Some(text) => {
            let text = text.trim();
            if text.is_empty() {
                Err(CliError::EmptySearch)
            } else {
                Ok(Some(text.to_string()))
            }
        }
    }
}
