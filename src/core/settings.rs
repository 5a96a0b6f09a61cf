//! Application settings management

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::geometry::WindowGeometry;

/// Environment variable that overrides the settings file location
pub const CONFIG_ENV: &str = "DUNGEON_HOST_CONFIG";

const DEFAULT_TITLE: &str = "Shifty Dungeon";
const DEFAULT_WIDTH: u32 = 1066;
const DEFAULT_HEIGHT: u32 = 600;

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Presentation
    /// Tab text, window title and default session partition
    pub title: String,
    /// Icon shown on the tab and window
    pub icon: String,
    /// Local document loaded into the content view
    pub document: String,

    // Window
    /// Base window width; also the minimum width
    pub base_width: u32,
    /// Base window height; fixes the aspect ratio
    pub base_height: u32,

    // Session
    /// Partition name of the isolated session (empty = title)
    pub partition: String,

    // Lifecycle
    /// Clear the creation guard when a creation attempt rolls back.
    /// When false a failed creation blocks every later activation until restart.
    pub release_guard_on_failure: bool,

    // Advanced
    /// Open detached developer tools after the document loads
    pub open_dev_tools: bool,
    /// Enable debug logging
    pub debug_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            icon: "./assets/128.png".to_string(),
            document: "index.html".to_string(),
            base_width: DEFAULT_WIDTH,
            base_height: DEFAULT_HEIGHT,
            partition: String::new(),
            release_guard_on_failure: true,
            open_dev_tools: false,
            debug_logging: false,
        }
    }
}

impl Settings {
    /// Load settings from `$DUNGEON_HOST_CONFIG` or the default location
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::default_path(),
        };
        Self::load_from(&path)
    }

    /// Load settings from `path`, falling back to defaults when the file is absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings at {:?}", path))?;
        let mut settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings at {:?}", path))?;
        settings.validate();

        info!("Settings loaded from {:?}", path);
        Ok(settings)
    }

    /// Get the settings file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ShiftyDungeon")
            .join("settings.json")
    }

    /// Validate settings and fix any invalid values
    pub fn validate(&mut self) {
        if self.title.trim().is_empty() {
            self.title = DEFAULT_TITLE.to_string();
        }
        if self.partition.trim().is_empty() {
            self.partition = self.title.clone();
        }
        if self.base_width == 0 {
            self.base_width = DEFAULT_WIDTH;
        }
        if self.base_height == 0 {
            self.base_height = DEFAULT_HEIGHT;
        }
    }

    /// Session partition name, falling back to the title
    pub fn partition(&self) -> &str {
        if self.partition.trim().is_empty() {
            &self.title
        } else {
            &self.partition
        }
    }

    pub fn geometry(&self) -> WindowGeometry {
        WindowGeometry::from_base(self.base_width, self.base_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("dungeon-host-{}.json", uuid::Uuid::new_v4()));
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.partition(), "Shifty Dungeon");
        assert!(settings.release_guard_on_failure);
    }

    #[test]
    fn partial_file_is_merged_over_defaults_and_validated() {
        let path = std::env::temp_dir().join(format!("dungeon-host-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{"title": "Other", "partition": "", "base_height": 0, "release_guard_on_failure": false}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.title, "Other");
        assert_eq!(settings.partition, "Other");
        assert_eq!(settings.base_height, 600);
        assert_eq!(settings.document, "index.html");
        assert!(!settings.release_guard_on_failure);
    }

    #[test]
    fn partition_follows_title_when_not_set() {
        let path = std::env::temp_dir().join(format!("dungeon-host-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"title": "Other"}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(settings.partition, "Other");
        assert_eq!(settings.partition(), "Other");
    }

    #[test]
    fn explicit_partition_is_kept() {
        let settings = Settings {
            title: "Other".to_string(),
            partition: "Vault".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.partition(), "Vault");

        let unvalidated = Settings {
            title: "Other".to_string(),
            ..Settings::default()
        };
        assert_eq!(unvalidated.partition(), "Other");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("dungeon-host-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{not json").unwrap();
        let result = Settings::load_from(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
