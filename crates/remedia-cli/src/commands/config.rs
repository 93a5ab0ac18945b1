use std::path::Path;

use remedia_core::config::ClientConfig;
use remedia_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::error::CliError;
use crate::paths::{config_path, resolve_client_config};

pub fn run_config(command: ConfigCommands, explicit_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            storage_bucket,
        } => {
            let path = config_path(explicit_path)?;
            let config = build_config(&supabase_url, &supabase_anon_key, storage_bucket)?;
            config.save_to_path(&path)?;
            println!("Wrote {}", path.display());
        }
        ConfigCommands::Show => {
            let config = resolve_client_config(explicit_path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

pub fn build_config(
    supabase_url: &str,
    supabase_anon_key: &str,
    storage_bucket: Option<String>,
) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::new(supabase_url, supabase_anon_key)?;
    if let Some(bucket) = normalize_text_option(storage_bucket) {
        config.storage_bucket = bucket;
    }
    Ok(config)
}
