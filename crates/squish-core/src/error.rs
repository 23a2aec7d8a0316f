//! Error types for Squish

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for Squish
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying codec failed while compressing
    #[error("{encoding} compression failed: {source}")]
    Codec {
        /// Encoding token of the failing codec
        encoding: &'static str,
        /// Codec error
        #[source]
        source: std::io::Error,
    },

    /// Response value could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A configured pattern failed to compile
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern
        pattern: String,
        /// Compiler message
        message: String,
    },

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a codec error for the given encoding token
    pub fn codec(encoding: &'static str, source: std::io::Error) -> Self {
        Error::Codec { encoding, source }
    }
}
