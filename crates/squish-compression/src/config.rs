//! Configuration for the compression handler

use crate::compressor::Compressor;
use crate::factory::CompressorFactory;
use crate::stream::StreamMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Compression options, fixed for the lifetime of a handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionOptions {
    /// Encoding token of the algorithm to use (`gzip`, `deflate`, `br`).
    /// Unknown tokens fall back to gzip.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Compression level; clamped to the algorithm's range at use.
    /// Unset means the algorithm default.
    #[serde(default)]
    pub level: Option<i32>,

    /// How long compressed artifacts stay cached, as whole seconds or a
    /// humantime string (`"24h"`). Zero disables caching.
    #[serde(
        default = "default_cache_ttl",
        with = "seconds_or_humantime",
        alias = "cacheTTL"
    )]
    pub cache_ttl: Duration,

    /// Honor the `x-no-compression` request header
    #[serde(default, alias = "disableByHeader")]
    pub disable_by_header: bool,

    /// Minimum serialized size (in bytes) worth compressing
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    /// Allow-list of encoding tokens (no restriction when unset)
    #[serde(default)]
    pub encodings: Option<Vec<String>>,

    /// Regular expression the response content type must match
    #[serde(default, alias = "compressibleTypes")]
    pub compressible_types: Option<String>,

    /// Compress through the chunked pipeline instead of in one call
    #[serde(default, alias = "useStream")]
    pub use_stream: bool,

    /// Size of each chunk fed to the streaming pipeline
    #[serde(default = "default_stream_chunk_size")]
    pub stream_chunk_size: usize,

    /// Whether the pipeline keeps one encoder across chunks
    #[serde(default)]
    pub stream_mode: StreamMode,

    /// Buffered payloads at least this large are compressed on the
    /// blocking thread pool
    #[serde(default = "default_offload_threshold")]
    pub offload_threshold: usize,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            level: None,
            cache_ttl: default_cache_ttl(),
            disable_by_header: false,
            threshold: default_threshold(),
            encodings: None,
            compressible_types: None,
            use_stream: false,
            stream_chunk_size: default_stream_chunk_size(),
            stream_mode: StreamMode::default(),
            offload_threshold: default_offload_threshold(),
        }
    }
}

fn default_algorithm() -> String {
    "gzip".to_string()
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_threshold() -> usize {
    1024 // 1KB
}

fn default_stream_chunk_size() -> usize {
    16 * 1024
}

fn default_offload_threshold() -> usize {
    64 * 1024
}

mod seconds_or_humantime {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub(super) fn serialize<S: Serializer>(
        ttl: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        humantime_serde::serialize(ttl, serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => {
                humantime_serde::re::humantime::parse_duration(&text).map_err(D::Error::custom)
            }
        }
    }
}

impl CompressionOptions {
    /// Compressor selected by `algorithm`
    pub fn compressor(&self) -> Compressor {
        CompressorFactory::create_compressor(Some(&self.algorithm))
    }

    /// Level actually used, after defaulting and clamping
    pub fn effective_level(&self) -> u32 {
        let algorithm = self.compressor().algorithm();
        algorithm.clamp_level(self.level.unwrap_or_else(|| algorithm.default_level()))
    }

    /// Whether compressed artifacts are cached at all
    pub fn caching_enabled(&self) -> bool {
        !self.cache_ttl.is_zero()
    }
}
