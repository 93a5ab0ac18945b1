//! Remedia CLI - browse and import content from the command line
//!
//! Reads go through the same query cache and feature services as the app.

mod auth;
mod cli;
mod commands;
mod error;
mod paths;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::list::run_list;
use crate::commands::media::run_media;
use crate::commands::product::run_product;
use crate::commands::theme::run_theme;
use crate::error::CliError;
use crate::paths::preferences_path;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "remedia=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::List {
            kind,
            search,
            limit,
            json,
        } => run_list(kind, search.as_deref(), limit, json, config_path).await?,
        Commands::Auth { command } => run_auth(command, config_path).await?,
        Commands::Media { command } => run_media(&command),
        Commands::Product { url } => run_product(&url, config_path).await?,
        Commands::Theme { command } => run_theme(&command, &preferences_path()?)?,
        Commands::Config { command } => run_config(command, config_path)?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
