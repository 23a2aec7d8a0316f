//! Configuration types

use serde::{Deserialize, Serialize};
use squish_cache::CacheConfig;
use squish_compression::CompressionOptions;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Compression behaviour
    #[serde(default)]
    pub compression: CompressionOptions,

    /// Cache of compressed artifacts
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error, or an `EnvFilter` directive)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
