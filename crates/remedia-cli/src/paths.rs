//! Locations of the CLI's config and preference files.

use std::path::{Path, PathBuf};

use remedia_core::config::ClientConfig;

use crate::error::CliError;

const APP_DIR_NAME: &str = "remedia";
const CONFIG_FILE_NAME: &str = "config.json";
const PREFERENCES_FILE_NAME: &str = "preferences.json";

fn app_dir() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve config directory".to_string()))
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    Ok(app_dir()?.join(CONFIG_FILE_NAME))
}

pub fn preferences_path() -> Result<PathBuf, CliError> {
    Ok(app_dir()?.join(PREFERENCES_FILE_NAME))
}

pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf, CliError> {
    explicit.map_or_else(default_config_path, |path| Ok(path.to_path_buf()))
}

/// Environment variables win over the config file.
pub fn resolve_client_config(explicit: Option<&Path>) -> Result<ClientConfig, CliError> {
    let from_env = ClientConfig::from_env()?;
    resolve_from(from_env, &config_path(explicit)?)
}

pub fn resolve_from(from_env: Option<ClientConfig>, path: &Path) -> Result<ClientConfig, CliError> {
    if let Some(config) = from_env {
        return Ok(config);
    }
    if path.exists() {
        return Ok(ClientConfig::load_from_path(path)?);
    }
    Err(CliError::NotConfigured)
}
