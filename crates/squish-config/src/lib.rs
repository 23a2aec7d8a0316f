//! # Squish Configuration
//!
//! Loads compression, cache and logging settings from:
//! - YAML, TOML or JSON files (format detected from the extension)
//! - Environment variables referenced as `${VAR}` or `${VAR:-default}`
//!
//! Every loaded configuration is validated before it is returned.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod loader;
pub mod types;
pub mod validator;

pub use loader::{load_from_file, load_from_str};
pub use types::{Config, LoggingConfig};
pub use validator::validate_config;

use squish_core::{Error, Result};
use std::path::Path;

/// Load configuration from a file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    load_from_file(path)
}

/// Load configuration from a string
pub fn load_str(content: &str, format: ConfigFormat) -> Result<Config> {
    load_from_str(content, format)
}

/// File formats a configuration can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Format for a file extension, ignoring case
    pub fn from_extension(ext: &str) -> Option<Self> {
        const KNOWN: [(&str, ConfigFormat); 4] = [
            ("yaml", ConfigFormat::Yaml),
            ("yml", ConfigFormat::Yaml),
            ("toml", ConfigFormat::Toml),
            ("json", ConfigFormat::Json),
        ];
        KNOWN
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(ext))
            .map(|&(_, format)| format)
    }

    /// Format of the file at `path`, from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|s| s.to_str()).ok_or_else(|| {
            Error::Config(format!("{} has no file extension", path.display()))
        })?;

        Self::from_extension(ext)
            .ok_or_else(|| Error::Config(format!("Unsupported config format: {ext}")))
    }
}
