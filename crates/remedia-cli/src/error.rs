use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] remedia_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Search text cannot be empty")]
    EmptySearch,
    #[error(
        "Remedia is not configured. Run `remedia config init` or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    NotConfigured,
}
