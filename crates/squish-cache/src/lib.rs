//! # Squish Cache
//!
//! In-memory time-to-live cache for compressed artifacts.
//!
//! Each cache is an owned component: cloning a [`TtlCache`] shares the
//! underlying store, but two caches built separately never see each other's
//! entries. Entries expire lazily on read, can be swept periodically by a
//! background task, and the cache can be bounded in size.
//!
//! ## Example
//!
//! ```rust
//! use squish_cache::TtlCache;
//! use std::time::Duration;
//!
//! let cache = TtlCache::new();
//! cache.set("gzip-6-hello", vec![1u8, 2, 3], Duration::from_secs(60));
//!
//! assert!(cache.has("gzip-6-hello"));
//! assert_eq!(cache.get("gzip-6-hello"), Some(vec![1, 2, 3]));
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod config;
mod ttl;

pub use config::CacheConfig;
pub use ttl::TtlCache;
