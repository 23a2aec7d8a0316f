//! Compression orchestration
//!
//! The handler is the only stateful piece of the pipeline. Per response it
//! evaluates the policy, then either compresses the whole payload (looking
//! it up in and populating the TTL cache) or runs it through the chunked
//! pipeline, and finally writes `Content-Encoding` and `Content-Type`.
//!
//! Failures never escape: a codec error yields
//! [`CompressionOutcome::Fallback`] with the original serialized bytes and
//! no headers written.

use crate::compressor::Compressor;
use crate::config::CompressionOptions;
use crate::policy::{CompressionPolicy, Decision, SkipReason};
use crate::stats::{CompressionStats, StatsSnapshot};
use crate::stream::StreamingCompressor;
use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use squish_cache::{CacheConfig, TtlCache};
use squish_core::{Error, RequestContext, ResponseContext, Result, Serialized};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the handler did with a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressionOutcome {
    /// Policy declined; the response passes through untouched
    Skipped(SkipReason),
    /// Body compressed and headers written
    Compressed {
        /// Compressed bytes
        body: Bytes,
        /// Encoding token written to Content-Encoding
        encoding: &'static str,
        /// Whether the body came from the cache
        cache_hit: bool,
    },
    /// Compression failed; the original serialized body, identity-encoded
    Fallback(Bytes),
}

impl CompressionOutcome {
    /// Whether a compressed body was produced
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed { .. })
    }

    /// Body to send, if the handler produced one
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            Self::Compressed { body, .. } | Self::Fallback(body) => Some(body),
            Self::Skipped(_) => None,
        }
    }

    /// Take the body to send, if the handler produced one
    pub fn into_body(self) -> Option<Bytes> {
        match self {
            Self::Compressed { body, .. } | Self::Fallback(body) => Some(body),
            Self::Skipped(_) => None,
        }
    }
}

/// Per-middleware compression handler
#[derive(Debug)]
pub struct CompressionHandler {
    options: CompressionOptions,
    policy: CompressionPolicy,
    compressor: Compressor,
    level: i32,
    cache: TtlCache<Bytes>,
    stats: Arc<CompressionStats>,
    #[cfg(test)]
    fail_codec: std::sync::atomic::AtomicBool,
}

impl CompressionHandler {
    /// Create a handler with its own unbounded cache.
    ///
    /// Inside a tokio runtime expired entries are swept every `cache_ttl`,
    /// at most [`CacheConfig`]'s default interval apart.
    pub fn new(options: CompressionOptions) -> Result<Self> {
        let cache = TtlCache::from_config(&sweep_config(&options));
        Self::with_cache(options, cache)
    }

    /// Create a handler that stores compressed artifacts in `cache`
    pub fn with_cache(options: CompressionOptions, cache: TtlCache<Bytes>) -> Result<Self> {
        let compressor = options.compressor();
        let policy = CompressionPolicy::new(&options, compressor)?;
        let level = options.effective_level() as i32;

        debug!(
            encoding = compressor.encoding(),
            level,
            threshold = options.threshold,
            use_stream = options.use_stream,
            "Compression handler configured"
        );

        Ok(Self {
            options,
            policy,
            compressor,
            level,
            cache,
            stats: Arc::new(CompressionStats::default()),
            #[cfg(test)]
            fail_codec: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Options this handler was built with
    pub fn options(&self) -> &CompressionOptions {
        &self.options
    }

    /// Compressor in use
    pub fn compressor(&self) -> Compressor {
        self.compressor
    }

    /// Effective compression level
    pub fn level(&self) -> i32 {
        self.level
    }

    /// Cache of compressed artifacts
    pub fn cache(&self) -> &TtlCache<Bytes> {
        &self.cache
    }

    /// Counters for this handler
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Policy gate, without side effects
    pub fn should_compress(&self, request: &RequestContext, response: &ResponseContext) -> bool {
        matches!(
            self.policy.evaluate_response(request, response),
            Decision::Compress(_)
        )
    }

    /// Cache key for a serialized payload.
    ///
    /// The full text is part of the key, so two different payloads never
    /// share an entry.
    pub fn cache_key(&self, text: &str) -> String {
        format!("{}-{}-{}", self.compressor.encoding(), self.level, text)
    }

    /// Compress the response if the policy allows it
    pub async fn handle_compression(
        &self,
        request: &RequestContext,
        response: &mut ResponseContext,
    ) -> CompressionOutcome {
        let (result, content_type) = {
            let payload = match self.policy.evaluate_response(request, response) {
                Decision::Compress(payload) => payload,
                Decision::Skip(reason) => {
                    self.stats.record_skip();
                    debug!(%reason, "Skipping compression");
                    return CompressionOutcome::Skipped(reason);
                }
            };

            let result = if self.options.use_stream {
                self.compress_streaming(&payload).await
            } else {
                self.compress_buffered(&payload).await
            };
            (
                result.map_err(|e| (e, payload.to_bytes())),
                payload.content_type(),
            )
        };

        match result {
            Ok((body, cache_hit)) => {
                let encoding = self.compressor.encoding();
                response.set_header(CONTENT_ENCODING, encoding);
                // a declared content type is kept
                if response.content_type().is_none() {
                    response.set_header(CONTENT_TYPE, content_type);
                }
                CompressionOutcome::Compressed {
                    body,
                    encoding,
                    cache_hit,
                }
            }
            Err((error, original)) => self.fallback(error, original),
        }
    }

    async fn compress_buffered(&self, payload: &Serialized<'_>) -> Result<(Bytes, bool)> {
        let key = self.cache_key(payload.text());

        if let Some(cached) = self.cache.get(&key) {
            self.stats.record_cache_hit();
            debug!(
                encoding = self.compressor.encoding(),
                bytes = cached.len(),
                "Cache hit"
            );
            return Ok((cached, true));
        }
        self.stats.record_cache_miss();

        let compressed = self.run_compressor(payload).await?;
        debug!(
            original_bytes = payload.len(),
            compressed_bytes = compressed.len(),
            encoding = self.compressor.encoding(),
            level = self.level,
            "Response compressed"
        );

        if self.options.caching_enabled() {
            self.cache
                .set(key, compressed.clone(), self.options.cache_ttl);
        }

        Ok((compressed, false))
    }

    async fn run_compressor(&self, payload: &Serialized<'_>) -> Result<Bytes> {
        self.stats.record_compression();
        self.check_codec()?;

        if payload.len() < self.options.offload_threshold {
            return self.compressor.compress(payload.as_bytes(), self.level);
        }

        let compressor = self.compressor;
        let level = self.level;
        let data = payload.to_bytes();
        tokio::task::spawn_blocking(move || compressor.compress(&data, level))
            .await
            .map_err(|e| Error::Internal(format!("Compression task failed: {e}")))?
    }

    async fn compress_streaming(&self, payload: &Serialized<'_>) -> Result<(Bytes, bool)> {
        self.stats.record_compression();
        self.check_codec()?;

        let streaming =
            StreamingCompressor::new(self.compressor, self.level, self.options.stream_mode);
        let compressed = streaming
            .compress(payload.to_bytes(), self.options.stream_chunk_size)
            .await?;

        debug!(
            original_bytes = payload.len(),
            compressed_bytes = compressed.len(),
            encoding = streaming.encoding(),
            mode = ?streaming.mode(),
            "Response compressed through stream pipeline"
        );

        Ok((compressed, false))
    }

    #[cfg(not(test))]
    fn check_codec(&self) -> Result<()> {
        Ok(())
    }

    /// Fails every compression once `fail_codec` is set
    #[cfg(test)]
    fn check_codec(&self) -> Result<()> {
        if self.fail_codec.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(Error::codec(
                self.compressor.encoding(),
                std::io::Error::new(std::io::ErrorKind::Other, "codec unavailable"),
            ));
        }
        Ok(())
    }

    fn fallback(&self, error: Error, original: Bytes) -> CompressionOutcome {
        self.stats.record_fallback();
        warn!(
            error = %error,
            encoding = self.compressor.encoding(),
            "Compression failed, sending uncompressed response"
        );
        CompressionOutcome::Fallback(original)
    }
}

/// Cache settings for handlers that build their own cache
fn sweep_config(options: &CompressionOptions) -> CacheConfig {
    let defaults = CacheConfig::default();
    CacheConfig {
        cleanup_interval: defaults
            .cleanup_interval
            .filter(|_| options.caching_enabled())
            .map(|every| every.min(options.cache_ttl)),
        ..defaults
    }
}
