use remedia_core::media::{classify_url, thumbnail_url};

use crate::cli::MediaCommands;

pub fn run_media(command: &MediaCommands) {
    println!("{}", media_output(command));
}

pub fn media_output(command: &MediaCommands) -> String {
    match command {
        MediaCommands::Classify { url } => classify_url(url).as_str().to_string(),
        MediaCommands::Thumbnail { url, fallback } => {
            thumbnail_url(url, fallback.as_deref()).unwrap_or_else(|| "(none)".to_string())
        }
    }
}
