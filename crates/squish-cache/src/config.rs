//! Configuration for the TTL cache

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on the number of entries (unbounded when unset)
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Interval of the background sweep of expired entries.
    /// Expired entries are still invisible to reads without it.
    #[serde(default = "default_cleanup_interval", with = "humantime_serde")]
    pub cleanup_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

fn default_cleanup_interval() -> Option<Duration> {
    Some(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, None);
        assert_eq!(config.cleanup_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"max_entries": 500, "cleanup_interval": "5m"}"#).unwrap();
        assert_eq!(config.max_entries, Some(500));
        assert_eq!(config.cleanup_interval, Some(Duration::from_secs(300)));

        let config: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CacheConfig::default());
    }
}
