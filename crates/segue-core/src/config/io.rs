//! Configuration persistence
//!
//! Generic YAML load/save used by the host application for
//! `PlayerSettings` (and anything else serializable). Loading never
//! fails: a missing or unparsable file falls back to defaults with a
//! logged warning.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load configuration from a YAML file, falling back to defaults
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        log::info!("no config at {:?}, using defaults", path);
        return T::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<T>(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("failed to parse config {:?}: {}, using defaults", path, e);
                T::default()
            }
        },
        Err(e) => {
            log::warn!("failed to read config {:?}: {}, using defaults", path, e);
            T::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("failed to serialize config")?;
    std::fs::write(path, yaml).with_context(|| format!("failed to write config {:?}", path))?;
    Ok(())
}

/// Default location of the player settings file
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("segue").join("settings.yaml"))
}
