use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "remedia")]
#[command(about = "Browse remedies, experts and videos from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List rows of a content table
    List {
        /// Content kind to list
        #[arg(value_enum)]
        kind: ContentKind,
        /// Only show rows whose name or title contains TEXT
        #[arg(long, value_name = "TEXT")]
        search: Option<String>,
        /// Number of rows to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign in, inspect or clear the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Inspect media URLs
    Media {
        #[command(subcommand)]
        command: MediaCommands,
    },
    /// Import product metadata from a shop page
    Product {
        /// Product page URL
        url: String,
    },
    /// Read or change the theme preference
    Theme {
        #[command(subcommand)]
        command: ThemeCommands,
    },
    /// Write the client config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ContentKind {
    Experts,
    Remedies,
    News,
    Videos,
    HealthConcerns,
    Symptoms,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
    System,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with email/password and store the session in the keychain
    Login {
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: String,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show the signed-in user and admin status
    Status,
    /// Sign out and clear the stored session
    Logout,
}

#[derive(Subcommand)]
pub enum MediaCommands {
    /// Print whether a URL is a video, image or YouTube link
    Classify {
        url: String,
    },
    /// Print the preview image URL for a media URL
    Thumbnail {
        url: String,
        /// Image to fall back to when none can be derived
        #[arg(long, value_name = "URL")]
        fallback: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ThemeCommands {
    /// Print the stored theme and how it resolves
    Get,
    /// Store a theme
    Set {
        #[arg(value_enum)]
        mode: ThemeArg,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write project URL and anon key to the config file
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: String,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: String,
        /// Storage bucket for uploads
        #[arg(long, value_name = "NAME")]
        storage_bucket: Option<String>,
    },
    /// Print the resolved config
    Show,
}
