//! Configuration validation

use crate::Config;
use squish_compression::{
    encoding_listed, CompressionAlgorithm, CompressionOptions, CompressionPolicy,
};
use squish_core::{Error, Result};
use std::time::Duration;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_compression(config)?;
    validate_cache(config)?;

    Ok(())
}

fn validate_compression(config: &Config) -> Result<()> {
    let options = &config.compression;

    if CompressionAlgorithm::from_token(&options.algorithm).is_none() {
        tracing::warn!(
            algorithm = %options.algorithm,
            "Unknown compression algorithm, gzip will be used"
        );
    }

    // Compiles the content-type pattern
    CompressionPolicy::new(options, options.compressor())?;

    if let Some(level) = options.level {
        let (min, max) = options.compressor().algorithm().level_range();
        if level < min as i32 || level > max as i32 {
            tracing::warn!(
                level,
                min,
                max,
                "Compression level out of range, it will be clamped"
            );
        }
    }

    if options.encodings.as_ref().is_some_and(Vec::is_empty) {
        tracing::warn!("encodings is an empty list, no response will be compressed");
    } else if !algorithm_allowed(options) {
        tracing::warn!(
            algorithm = %options.algorithm,
            "Configured algorithm is not in encodings, no response will be compressed"
        );
    }

    if options.stream_chunk_size == 0 {
        return Err(Error::Config("stream_chunk_size must be > 0".to_string()));
    }

    if options.threshold > options.offload_threshold {
        tracing::warn!(
            threshold = options.threshold,
            offload_threshold = options.offload_threshold,
            "threshold exceeds offload_threshold, every compression will run on the blocking pool"
        );
    }

    if options.use_stream && options.caching_enabled() {
        tracing::debug!("Streamed responses are not cached, cache_ttl only applies to buffered compression");
    }

    Ok(())
}

/// Same allow-list rule the policy applies at request time
fn algorithm_allowed(options: &CompressionOptions) -> bool {
    options
        .encodings
        .as_deref()
        .map_or(true, |allowed| encoding_listed(allowed, options.compressor().encoding()))
}

fn validate_cache(config: &Config) -> Result<()> {
    if config.cache.max_entries == Some(0) {
        return Err(Error::Config("cache max_entries must be > 0".to_string()));
    }

    if config.cache.cleanup_interval == Some(Duration::ZERO) {
        return Err(Error::Config("cache cleanup_interval must be > 0".to_string()));
    }

    Ok(())
}
