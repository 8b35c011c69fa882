// Configuration management for persistent state

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::settings::Settings;

#[cfg(debug_assertions)]
const APP_NAME: &str = "mangoview-dev";

#[cfg(not(debug_assertions))]
const APP_NAME: &str = "mangoview";

/// Manages persistent configuration files
#[derive(Clone, Debug)]
pub struct ConfigManager {
    config_dir: PathBuf,
    settings_file: String,
}

impl ConfigManager {
    const SETTINGS_FILE: &'static str = "settings.json";

    /// Create a new ConfigManager, initializing the config directory if needed
    pub fn new() -> Result<Self> {
        Self::with_config_dir(Self::get_config_dir()?)
    }

    /// Use an explicit directory instead of the platform default.
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        }

        Ok(Self { config_dir, settings_file: Self::SETTINGS_FILE.to_string() })
    }

    /// Manager reading and writing settings at an explicit file path.
    pub fn for_settings_file(settings_path: &Path) -> Result<Self> {
        let file_name = settings_path
            .file_name()
            .and_then(|name| name.to_str())
            .context("Settings path has no file name")?;
        let dir = settings_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut manager = Self::with_config_dir(dir)?;
        manager.settings_file = file_name.to_string();
        Ok(manager)
    }

    /// Get the platform-specific config directory
    fn get_config_dir() -> Result<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_NAME)).context("Could not determine config directory")
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.file_path(&self.settings_file)
    }

    /// Get path to a specific config file
    fn file_path(&self, filename: &str) -> PathBuf {
        self.config_dir.join(filename)
    }

    /// Load data from a JSON file
    fn load_json<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        let path = self.file_path(filename);

        if !path.exists() {
            return Ok(None);
        }

        let data =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {}", filename))?;

        let value: T = serde_json::from_str(&data)
            .with_context(|| format!("Failed to deserialize {}", filename))?;

        Ok(Some(value))
    }

    /// Save data to a JSON file (atomic via temp + rename).
    fn save_json<T: Serialize + ?Sized>(&self, filename: &str, data: &T) -> Result<()> {
        let path = self.file_path(filename);

        let json = serde_json::to_string_pretty(data)
            .with_context(|| format!("Failed to serialize {}", filename))?;

        atomic_write(&path, json.as_bytes())
            .with_context(|| format!("Failed to write {}", filename))?;

        Ok(())
    }

    /// Load application settings, falling back to defaults when none are saved.
    pub fn load_settings(&self) -> Result<Settings> {
        let settings = self.load_json(&self.settings_file)?.unwrap_or_default();
        log::debug!("Loaded settings from {}", self.settings_path().display());
        Ok(settings)
    }

    /// Save application settings to disk
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.save_json(&self.settings_file, settings)
    }
}

/// Write `data` to `path` through a sibling temp file followed by a rename,
/// so readers see either the old content or the new content.
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(path);
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
