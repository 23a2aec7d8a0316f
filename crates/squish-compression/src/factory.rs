//! Compressor selection by encoding token

use crate::compressor::{CompressionAlgorithm, Compressor};

/// Selects a [`Compressor`] from an encoding token
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressorFactory;

impl CompressorFactory {
    /// Create a compressor for `token`.
    ///
    /// Unknown or missing tokens resolve to gzip, which every client supports.
    pub fn create_compressor(token: Option<&str>) -> Compressor {
        let algorithm = token
            .and_then(CompressionAlgorithm::from_token)
            .unwrap_or_default();
        Compressor::new(algorithm)
    }
}
