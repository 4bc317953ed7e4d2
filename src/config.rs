//! Configuration management for recording sessions
//!
//! Provides loading, saving and validation of the session defaults (which
//! inputs to attach, orientation policy) and the storage naming scheme used
//! to generate recording destinations.

use crate::errors::ConfigError;
use crate::types::{DeviceSelector, Orientation};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RecorderConfig {
    pub session: SessionConfig,
    pub storage: StorageConfig,
}

/// Session defaults applied at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inputs to attach: any of "mic", "front_camera", "back_camera"
    pub devices: Vec<String>,
    /// Follow the device's physical orientation on adaptation requests
    pub auto_orientation: bool,
    /// Orientation applied before the first adaptation
    pub orientation: Orientation,
}

/// Where recordings are written and how they are named
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub output_directory: String,
    pub file_prefix: String,
    pub file_extension: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            devices: vec!["back_camera".to_string(), "mic".to_string()],
            auto_orientation: true,
            orientation: Orientation::Portrait,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_directory: "./recordings".to_string(),
            file_prefix: "recording".to_string(),
            file_extension: "mov".to_string(),
        }
    }
}

impl RecorderConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: RecorderConfig = toml::from_str(&contents)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        fs::write(path, toml_string)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("recsession.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Combined selector for the configured device names
    pub fn device_selector(&self) -> Result<DeviceSelector, ConfigError> {
        let mut selector = DeviceSelector::NONE;
        for name in &self.session.devices {
            let flag = DeviceSelector::from_name(name)
                .ok_or_else(|| ConfigError::Invalid(format!("Unknown device name: {}", name)))?;
            selector |= flag;
        }
        Ok(selector)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_selector()?.is_empty() {
            return Err(ConfigError::Invalid(
                "At least one capture device must be configured".to_string(),
            ));
        }
        if self.storage.output_directory.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Output directory cannot be empty".to_string(),
            ));
        }
        if self.storage.file_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("File prefix cannot be empty".to_string()));
        }
        let extension = self.storage.file_extension.trim();
        if extension.is_empty() || extension.contains('.') || extension.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "Invalid file extension: {:?}",
                self.storage.file_extension
            )));
        }
        Ok(())
    }

    /// Fresh destination path: `<dir>/<prefix>-<YYYYmmdd-HHMMSS>-<id>.<ext>`
    pub fn next_destination(&self) -> PathBuf {
        let id = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}-{}-{}.{}",
            self.storage.file_prefix,
            Utc::now().format("%Y%m%d-%H%M%S"),
            &id[..8],
            self.storage.file_extension
        );
        Path::new(&self.storage.output_directory).join(file_name)
    }
}
