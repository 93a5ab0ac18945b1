use std::path::Path;

use remedia_core::theme::{resolve_theme, PreferenceStore, ThemeMode, ThemeStore};

use crate::cli::{ThemeArg, ThemeCommands};
use crate::error::CliError;

impl From<ThemeArg> for ThemeMode {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Self::Light,
            ThemeArg::Dark => Self::Dark,
            ThemeArg::System => Self::System,
        }
    }
}

pub fn run_theme(command: &ThemeCommands, preferences_path: &Path) -> Result<(), CliError> {
    let store = ThemeStore::new(PreferenceStore::new(preferences_path));
    match command {
        ThemeCommands::Get => {
            let mode = store.load();
            let resolved = resolve_theme(mode, system_prefers_dark());
            println!("{mode} (resolves to {})", if resolved.is_dark() { "dark" } else { "light" });
        }
        ThemeCommands::Set { mode } => {
            let mode = ThemeMode::from(*mode);
            store.save(mode)?;
            println!("Theme set to {mode}");
        }
    }
    Ok(())
}

/// Terminals expose no color-scheme query; `REMEDIA_SYSTEM_THEME=dark` stands in.
fn system_prefers_dark() -> bool {
    std::env::var("REMEDIA_SYSTEM_THEME").is_ok_and(|value| value.eq_ignore_ascii_case("dark"))
}
