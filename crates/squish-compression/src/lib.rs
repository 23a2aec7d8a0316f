//! Response compression for Squish
//!
//! Provides:
//! - gzip, deflate (zlib) and brotli compressors with level clamping
//! - A side-effect free policy deciding whether a response is compressed
//! - Content negotiation on `Accept-Encoding`
//! - A TTL cache of compressed artifacts keyed by algorithm, level and payload
//! - Buffered and chunked (streaming) execution paths
//! - An HTTP middleware wrapping it all
//!
//! ## Example
//!
//! ```rust
//! use squish_compression::{CompressionHandler, CompressionOptions};
//! use squish_core::{RequestContext, ResponseContext};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> squish_core::Result<()> {
//! let handler = CompressionHandler::new(CompressionOptions {
//!     threshold: 10,
//!     ..Default::default()
//! })?;
//!
//! let request = RequestContext::default().with_header("accept-encoding", "gzip");
//! let mut response = ResponseContext::new("a response long enough to compress");
//!
//! let outcome = handler.handle_compression(&request, &mut response).await;
//! assert!(outcome.is_compressed());
//! assert_eq!(response.headers()["content-encoding"], "gzip");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod compressor;
pub mod config;
pub mod factory;
pub mod handler;
pub mod middleware;
pub mod policy;
pub mod stats;
pub mod stream;

pub use compressor::{CompressionAlgorithm, Compressor};
pub use config::CompressionOptions;
pub use factory::CompressorFactory;
pub use handler::{CompressionHandler, CompressionOutcome};
pub use middleware::CompressionMiddleware;
pub use policy::{
    accepts_encoding, encoding_listed, CompressionPolicy, Decision, SkipReason,
    NO_COMPRESSION_HEADER,
};
pub use stats::{CompressionStats, StatsSnapshot};
pub use stream::{StreamMode, StreamingCompressor};
