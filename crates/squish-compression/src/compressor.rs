//! Core compression functionality

use bytes::Bytes;
use squish_core::{Error, Result};
use std::fmt;
use std::io::Write;

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionAlgorithm {
    /// gzip (RFC 1952), universally supported
    #[default]
    Gzip,
    /// zlib-wrapped deflate (RFC 1950), the HTTP `deflate` coding
    Deflate,
    /// Brotli (RFC 7932)
    Brotli,
}

impl CompressionAlgorithm {
    /// Get the Content-Encoding header value
    pub fn encoding(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            Self::Brotli => "br",
        }
    }

    /// Parse an encoding token; `brotli` is accepted as an alias of `br`
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "gzip" => Some(Self::Gzip),
            "deflate" => Some(Self::Deflate),
            "br" | "brotli" => Some(Self::Brotli),
            _ => None,
        }
    }

    /// Valid level range, inclusive
    pub fn level_range(&self) -> (u32, u32) {
        match self {
            Self::Gzip | Self::Deflate => (0, 9),
            Self::Brotli => (1, 11),
        }
    }

    /// Level used when none is configured
    pub fn default_level(&self) -> i32 {
        match self {
            Self::Gzip | Self::Deflate => 6,
            Self::Brotli => 11,
        }
    }

    /// Clamp an arbitrary configured level into the valid range
    pub fn clamp_level(&self, level: i32) -> u32 {
        let (min, max) = self.level_range();
        level.clamp(min as i32, max as i32) as u32
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encoding())
    }
}

/// Stateless compressor for complete in-memory payloads.
///
/// `compress` is a pure function of the payload and the level, so one
/// instance is shared by every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compressor {
    algorithm: CompressionAlgorithm,
}

impl Compressor {
    /// Create a compressor for `algorithm`
    pub const fn new(algorithm: CompressionAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Algorithm this compressor implements
    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// Encoding token written to Content-Encoding
    pub fn encoding(&self) -> &'static str {
        self.algorithm.encoding()
    }

    /// Compress `data` at `level`, clamped to the algorithm's range
    pub fn compress(&self, data: &[u8], level: i32) -> Result<Bytes> {
        let level = self.algorithm.clamp_level(level);
        let compressed = match self.algorithm {
            CompressionAlgorithm::Gzip => compress_gzip(data, level),
            CompressionAlgorithm::Deflate => compress_deflate(data, level),
            CompressionAlgorithm::Brotli => compress_brotli(data, level),
        };

        compressed
            .map(Bytes::from)
            .map_err(|e| Error::codec(self.encoding(), e))
    }
}

fn compress_gzip(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

fn compress_deflate(data: &[u8], level: u32) -> std::io::Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

fn compress_brotli(data: &[u8], quality: u32) -> std::io::Result<Vec<u8>> {
    let mut compressed = Vec::new();
    brotli::BrotliCompress(
        &mut std::io::Cursor::new(data),
        &mut compressed,
        &brotli::enc::BrotliEncoderParams {
            quality: quality as i32,
            ..Default::default()
        },
    )?;
    Ok(compressed)
}
