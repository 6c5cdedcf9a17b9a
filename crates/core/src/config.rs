use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bridge::DEFAULT_CHANNEL_NAME;
use crate::ui_loop::QueuePolicy;

const CONFIG_FILE_NAME: &str = "config.json";
const MIN_QUEUE_CAPACITY: usize = 16;
const MAX_QUEUE_CAPACITY: usize = 65536;

/// Bridge settings persisted to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Open the MIDI input at startup
    pub midi_enabled: bool,
    /// Client name announced to the platform MIDI API
    pub client_name: String,
    /// Name of the UI command channel
    pub channel_name: String,
    /// Bound on queued UI messages. `None` never drops events.
    pub queue_capacity: Option<usize>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            midi_enabled: true,
            client_name: "keybridge".to_string(),
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            queue_capacity: None,
        }
    }
}

impl BridgeSettings {
    pub fn queue_policy(&self) -> QueuePolicy {
        QueuePolicy::from_capacity(self.queue_capacity)
    }
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: BridgeSettings,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Failed to parse config file: {0}")]
    ParseError(String),
    #[error("Failed to serialize config: {0}")]
    SerializeError(String),
    #[error("Config validation errors: {}", .0.join(", "))]
    ValidationError(Vec<String>),
}

/// Loads and saves [`BridgeSettings`] as JSON.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: BridgeSettings,
}

impl ConfigManager {
    /// Create a new configuration manager.
    /// Without a path, the file lives in the platform config directory
    /// (falling back to `config.json` in the working directory).
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(Self::default_path);

        Self {
            config_path,
            settings: BridgeSettings::default(),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("keybridge").join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Load settings from the configuration file.
    /// Writes a default file when none exists yet.
    pub fn load(&mut self) -> Result<BridgeSettings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }
        self.read()
    }

    /// Like [`load`](Self::load), but never touches the disk beyond reading.
    /// A missing file yields the default settings.
    pub fn read(&mut self) -> Result<BridgeSettings, ConfigError> {
        if !self.config_path.exists() {
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::ValidationError)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to the configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Update settings and save to file
    pub fn update_settings(&mut self, settings: BridgeSettings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn validate_settings(settings: &BridgeSettings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if settings.client_name.trim().is_empty() {
            errors.push("client_name must not be empty".to_string());
        }
        if settings.channel_name.trim().is_empty() {
            errors.push("channel_name must not be empty".to_string());
        }
        if let Some(capacity) = settings.queue_capacity {
            if !(MIN_QUEUE_CAPACITY..=MAX_QUEUE_CAPACITY).contains(&capacity) {
                errors.push(format!(
                    "queue_capacity must be between {} and {}",
                    MIN_QUEUE_CAPACITY, MAX_QUEUE_CAPACITY
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
