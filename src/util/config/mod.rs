//! YaoXiang stream configuration
//!
//! Defaults applied to newly created streams, loaded from the user-level
//! configuration file.
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. Per-stream open options
//! 2. User-level (~/.config/yaoxiang/stream.toml)
//! 3. Default values
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use yaoxiang_stream::util::config::load_stream_config;
//!
//! let config = load_stream_config().unwrap();
//! assert!(config.buffer_size > 0);
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::stream::encoding::{Encoding, Newline};

/// How strictly text/binary mismatches are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTypeCheck {
    /// Every mismatch is an error.
    Strict,
    /// Binary I/O on a text stream is allowed if its encoding is single-byte.
    #[default]
    Loose,
    /// No checking.
    Off,
}

/// Stream defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Encoding of text streams opened without an explicit encoding
    #[serde(default = "default_encoding")]
    pub default_encoding: Encoding,
    #[serde(default)]
    pub stream_type_check: StreamTypeCheck,
    /// Size of read and write buffers in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Upper bound of bytes decoded by one pending-input read
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
    /// Newline mode of new output streams
    #[serde(default)]
    pub newline: Newline,
}

fn default_encoding() -> Encoding {
    Encoding::Utf8
}

fn default_buffer_size() -> usize {
    4096
}

fn default_max_pending() -> usize {
    4096
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            default_encoding: Encoding::Utf8,
            stream_type_check: StreamTypeCheck::Loose,
            buffer_size: 4096,
            max_pending: 4096,
            newline: Newline::Posix,
        }
    }
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    // Try XDG config directory on Unix
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("yaoxiang"));
    }

    // Fallback to ~/.config/yaoxiang
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("yaoxiang"));
    }

    // On Windows, try %APPDATA%
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("yaoxiang"));
    }

    None
}

/// Get the stream config file path (~/.config/yaoxiang/stream.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("stream.toml"))
}

/// Load the stream configuration.
/// Returns the defaults if no file exists.
pub fn load_stream_config() -> Result<StreamConfig, ConfigError> {
    match get_config_path() {
        Some(path) if path.exists() => load_config_file(&path),
        _ => Ok(StreamConfig::default()),
    }
}

/// Load a stream configuration from an explicit file
pub fn load_config_file(path: &Path) -> Result<StreamConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::IoError)?;
    parse_config(&content)
}

/// Parse a stream configuration from TOML text
pub fn parse_config(content: &str) -> Result<StreamConfig, ConfigError> {
    let config: StreamConfig = toml::from_str(content).map_err(ConfigError::ParseError)?;
    if config.buffer_size == 0 {
        return Err(ConfigError::Invalid("buffer_size must be at least 1"));
    }
    if config.max_pending == 0 {
        return Err(ConfigError::Invalid("max_pending must be at least 1"));
    }
    if config.newline == Newline::Detect {
        return Err(ConfigError::Invalid(
            "newline = \"detect\" is only valid for input streams",
        ));
    }
    Ok(config)
}

/// Save the stream configuration
pub fn save_stream_config(config: &StreamConfig) -> Result<(), ConfigError> {
    let dir = get_config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("stream.toml");

    // Create directory if not exists
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(ConfigError::IoError)?;
    }

    let content = toml::to_string_pretty(config).map_err(ConfigError::SerializeError)?;
    fs::write(&path, content).map_err(ConfigError::IoError)?;

    Ok(())
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(toml::de::Error),
    SerializeError(toml::ser::Error),
    Invalid(&'static str),
    NoConfigDir,
}

impl std::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Config parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "Config serialize error: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
            ConfigError::NoConfigDir => write!(f, "Cannot determine config directory"),
        }
    }
}

impl std::error::Error for ConfigError {}
