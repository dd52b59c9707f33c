//! Device configuration records.
//!
//! A [`DeviceRecord`] is the persisted shape of one device:
//!
//! ```json
//! { "name": "Launchpad", "active": 3, "thru": "Synth" }
//! ```
//!
//! - `active` packs the requested state per direction (bit0 = input,
//!   bit1 = output) and is always written.
//! - `thru` is only written when non-empty.
//!
//! [`RegistryConfig`] is a list of records and can be read from / written to
//! JSON or TOML. The file format is picked from the path's extension.

use crate::direction::DirectionSet;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Persisted state of a single device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,

    /// Requested active state as a bitmask (bit0 = input, bit1 = output).
    /// Any integer is accepted; only the two low bits are read.
    #[serde(default)]
    pub active: i64,

    /// Pass-through target device name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thru: Option<String>,
}

impl DeviceRecord {
    /// A record carrying only a name: no directions requested, no thru.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_active(mut self, active: DirectionSet) -> Self {
        self.active = active.to_mask();
        self
    }

    pub fn with_thru(mut self, thru: impl Into<String>) -> Self {
        self.thru = Some(thru.into());
        self
    }

    /// Requested directions, decoded from the bitmask.
    pub fn active_set(&self) -> DirectionSet {
        DirectionSet::from_mask(self.active)
    }

    /// The thru target, with `""` treated as absent.
    pub fn thru_name(&self) -> Option<&str> {
        self.thru.as_deref().filter(|t| !t.is_empty())
    }
}

/// On-disk file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick a format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ConfigFormat::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(ConfigFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Serializable set of device records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

impl RegistryConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Read a config file; `.json` and `.toml` are supported.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let text = std::fs::read_to_string(path)?;
        match format {
            ConfigFormat::Json => Self::from_json_str(&text),
            ConfigFormat::Toml => Self::from_toml_str(&text),
        }
    }

    /// Write a config file; `.json` and `.toml` are supported.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => self.to_json_string()?,
            ConfigFormat::Toml => self.to_toml_string()?,
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.devices.iter().position(|d| d.name.is_empty()) {
            Some(index) => Err(ConfigError::MissingName(index)),
            None => Ok(()),
        }
    }
}
