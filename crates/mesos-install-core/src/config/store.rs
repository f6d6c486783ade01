//! Settings store for locating and loading config.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{Settings, parser};

/// System-wide settings location.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/mesos-install/config.toml";

#[derive(Debug, Clone)]
pub struct SettingsStore {
    config_path: Option<PathBuf>,
}

impl SettingsStore {
    /// Locate settings: explicit path, then the system path, then the
    /// per-user config directory. No file at all means defaults.
    pub fn discover(explicit: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Self::from_path(path));
        }

        let user_path = dirs::config_dir().map(|p| p.join("mesos-install").join("config.toml"));
        let config_path = std::iter::once(PathBuf::from(SYSTEM_CONFIG_PATH))
            .chain(user_path)
            .find(|p| p.exists());

        Ok(Self { config_path })
    }

    pub fn from_path(path: PathBuf) -> Self {
        Self {
            config_path: Some(path),
        }
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn load(&self) -> anyhow::Result<Settings> {
        match &self.config_path {
            Some(path) if path.exists() => parser::parse_settings_toml(path),
            _ => Ok(Settings::default()),
        }
    }

    pub fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No config path to save settings to"))?;
        let content = parser::to_toml(settings).context("Failed to serialize settings to TOML")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
