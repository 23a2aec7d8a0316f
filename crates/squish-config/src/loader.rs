//! Configuration loading

use crate::{Config, ConfigFormat};
use regex::{Captures, Regex};
use squish_core::{Error, Result};
use std::env;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load and validate configuration from a file
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {}: {e}", path.display())))?;

    let format = ConfigFormat::from_path(path)?;
    debug!(path = %path.display(), ?format, "Loading configuration");

    load_from_str(&content, format)
}

/// Expand environment variables in a configuration string.
/// Supports `${VAR}` and `${VAR:-default}`.
fn expand_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}")
        .map_err(|e| Error::Config(format!("Invalid regex: {e}")))?;

    let mut missing = None;
    let expanded = re.replace_all(content, |cap: &Captures<'_>| {
        let name = &cap[1];
        match (env::var(name), cap.get(3)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(Error::Config(format!(
            "Environment variable '{name}' not set and no default provided"
        ))),
        None => Ok(expanded.into_owned()),
    }
}

/// Load and validate configuration from a string
pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<Config> {
    let expanded = expand_env_vars(content)?;

    let config: Config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse YAML: {e}")))?,
        ConfigFormat::Toml => toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))?,
        ConfigFormat::Json => serde_json::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse JSON: {e}")))?,
    };

    crate::validator::validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use squish_compression::StreamMode;
    use std::io::Write;
    use std::time::Duration;

    const YAML_CONFIG: &str = r#"
compression:
  algorithm: br
  level: 5
  cache_ttl: 1h
  disable_by_header: true
  threshold: 10
  encodings: [br, gzip]
  compressible_types: "^text/|application/json"
  use_stream: true
  stream_chunk_size: 4096
  stream_mode: per_chunk

cache:
  max_entries: 1000
  cleanup_interval: 30s

logging:
  level: debug
  json: true
"#;

    #[test]
    fn test_load_yaml() {
        let config = load_from_str(YAML_CONFIG, ConfigFormat::Yaml).unwrap();

        assert_eq!(config.compression.algorithm, "br");
        assert_eq!(config.compression.level, Some(5));
        assert_eq!(config.compression.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.compression.threshold, 10);
        assert_eq!(
            config.compression.encodings,
            Some(vec!["br".to_string(), "gzip".to_string()])
        );
        assert_eq!(config.compression.stream_chunk_size, 4096);
        assert_eq!(config.compression.stream_mode, StreamMode::PerChunk);
        assert_eq!(config.cache.max_entries, Some(1000));
        assert_eq!(config.cache.cleanup_interval, Some(Duration::from_secs(30)));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_toml() {
        let config = load_from_str(
            r#"
[compression]
algorithm = "deflate"
threshold = 2048

[logging]
level = "warn"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.compression.algorithm, "deflate");
        assert_eq!(config.compression.threshold, 2048);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.cache.cleanup_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_load_json_with_camel_case() {
        let config = load_from_str(
            r#"{"compression": {"cacheTTL": "10m", "useStream": true}}"#,
            ConfigFormat::Json,
        )
        .unwrap();

        assert_eq!(config.compression.cache_ttl, Duration::from_secs(600));
        assert!(config.compression.use_stream);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = load_from_str("compression: [yaml", ConfigFormat::Yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let result = load_from_str(
            "compression:\n  compressible_types: \"^text/(\"\n",
            ConfigFormat::Yaml,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_env_var_substitution() {
        env::set_var("SQUISH_TEST_ALGORITHM", "br");
        env::set_var("SQUISH_TEST_THRESHOLD", "4096");

        let config = load_from_str(
            "compression:\n  algorithm: ${SQUISH_TEST_ALGORITHM}\n  threshold: ${SQUISH_TEST_THRESHOLD}\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(config.compression.algorithm, "br");
        assert_eq!(config.compression.threshold, 4096);

        env::remove_var("SQUISH_TEST_ALGORITHM");
        env::remove_var("SQUISH_TEST_THRESHOLD");
    }

    #[test]
    fn test_env_var_with_default() {
        env::remove_var("SQUISH_UNDEFINED_LEVEL");

        let config = load_from_str(
            "logging:\n  level: ${SQUISH_UNDEFINED_LEVEL:-trace}\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_env_var_overrides_default() {
        env::set_var("SQUISH_OVERRIDE_TTL", "5s");

        let config = load_from_str(
            "compression:\n  cache_ttl: ${SQUISH_OVERRIDE_TTL:-1h}\n",
            ConfigFormat::Yaml,
        )
        .unwrap();
        assert_eq!(config.compression.cache_ttl, Duration::from_secs(5));

        env::remove_var("SQUISH_OVERRIDE_TTL");
    }

    #[test]
    fn test_missing_env_var_no_default() {
        env::remove_var("SQUISH_MISSING_VAR");

        let result = load_from_str(
            "compression:\n  algorithm: ${SQUISH_MISSING_VAR}\n",
            ConfigFormat::Yaml,
        );
        assert!(result.unwrap_err().to_string().contains("SQUISH_MISSING_VAR"));
    }

    #[test]
    fn test_multiple_env_vars() {
        env::set_var("SQUISH_A", "text");
        env::set_var("SQUISH_B", "json");

        let expanded = expand_env_vars("^${SQUISH_A}/|application/${SQUISH_B}").unwrap();
        assert_eq!(expanded, "^text/|application/json");

        env::remove_var("SQUISH_A");
        env::remove_var("SQUISH_B");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(YAML_CONFIG.as_bytes()).unwrap();

        let config = crate::load(file.path()).unwrap();
        assert_eq!(config.compression.algorithm, "br");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_from_file(dir.path().join("absent.toml"));
        assert!(result.is_err());
    }
}
