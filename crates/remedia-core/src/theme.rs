//! Theme preference and its persisted key-value store.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const THEME_KEY: &str = "app-theme";

/// User-selected theme mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    /// Follow the system preference
    #[default]
    System,
}

impl ThemeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(Error::invalid_input(format!(
                "Unknown theme '{other}', expected light, dark or system"
            ))),
        }
    }
}

/// Theme actually applied after resolving [`ThemeMode::System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolvedTheme {
    #[default]
    Light,
    Dark,
}

impl ResolvedTheme {
    #[must_use]
    pub const fn is_dark(self) -> bool {
        matches!(self, Self::Dark)
    }
}

#[must_use]
pub const fn resolve_theme(mode: ThemeMode, system_dark: bool) -> ResolvedTheme {
    match mode {
        ThemeMode::Light => ResolvedTheme::Light,
        ThemeMode::Dark => ResolvedTheme::Dark,
        ThemeMode::System if system_dark => ResolvedTheme::Dark,
        ThemeMode::System => ResolvedTheme::Light,
    }
}

/// String key-value pairs persisted as a JSON object.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|error| {
            Error::Io(format!(
                "Failed to read preferences at {}: {error}",
                self.path.display()
            ))
        })?;
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|error| {
            Error::Serialization(format!(
                "Failed to parse preferences at {}: {error}",
                self.path.display()
            ))
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.load().unwrap_or_else(|error| {
            tracing::warn!("Replacing unreadable preferences: {}", error);
            BTreeMap::new()
        });
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::Io(format!(
                    "Failed to create preferences directory {}: {error}",
                    parent.display()
                ))
            })?;
        }
        let serialized = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, serialized).map_err(|error| {
            Error::Io(format!(
                "Failed to write preferences at {}: {error}",
                self.path.display()
            ))
        })
    }
}

/// Reads and writes the theme preference under [`THEME_KEY`].
#[derive(Debug, Clone)]
pub struct ThemeStore {
    store: PreferenceStore,
}

impl ThemeStore {
    pub const fn new(store: PreferenceStore) -> Self {
        Self { store }
    }

    /// Stored mode, or [`ThemeMode::System`] when missing or unreadable.
    pub fn load(&self) -> ThemeMode {
        match self.store.get(THEME_KEY) {
            Ok(Some(value)) => value.parse().unwrap_or_else(|error| {
                tracing::warn!("Ignoring stored theme: {}", error);
                ThemeMode::default()
            }),
            Ok(None) => ThemeMode::default(),
            Err(error) => {
                tracing::warn!("Failed to load theme preference: {}", error);
                ThemeMode::default()
            }
        }
    }

    pub fn save(&self, mode: ThemeMode) -> Result<()> {
        self.store.set(THEME_KEY, mode.as_str())?;
        tracing::debug!(theme = %mode, "Saved theme preference");
        Ok(())
    }
}
