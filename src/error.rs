//! Error types.

use crate::direction::Direction;
use thiserror::Error;

/// Failures from driving a device's ports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// After a toggle the port is not in the state that was asked for.
    ///
    /// `reason` carries the transport's own complaint, when it gave one.
    #[error(
        "{device}: {direction} port did not {} ({})",
        toggle_verb(.expected_open),
        reason_text(.reason)
    )]
    PortOpen {
        device: String,
        direction: Direction,
        expected_open: bool,
        reason: Option<String>,
    },
}

fn toggle_verb(expected_open: &bool) -> &'static str {
    if *expected_open {
        "open"
    } else {
        "close"
    }
}

fn reason_text(reason: &Option<String>) -> &str {
    reason.as_deref().unwrap_or("no transport error")
}

/// Failures while loading or saving a device configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
    #[error("device record #{0} has an empty name")]
    MissingName(usize),
}
