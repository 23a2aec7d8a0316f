//! Counters describing what the handler did

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated by the handler
#[derive(Debug, Default)]
pub struct CompressionStats {
    compressions: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    skipped: AtomicU64,
    fallbacks: AtomicU64,
}

/// Point-in-time copy of [`CompressionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Compressor invocations (buffered calls and streaming pipelines)
    pub compressions: u64,
    /// Responses served from the cache
    pub cache_hits: u64,
    /// Cache lookups that missed
    pub cache_misses: u64,
    /// Responses the policy declined to compress
    pub skipped: u64,
    /// Responses sent uncompressed after a failure
    pub fallbacks: u64,
}

impl CompressionStats {
    pub(crate) fn record_compression(&self) {
        self.compressions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            compressions: self.compressions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = CompressionStats::default();
        stats.record_compression();
        stats.record_cache_miss();
        stats.record_cache_hit();
        stats.record_cache_hit();
        stats.record_skip();

        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                compressions: 1,
                cache_hits: 2,
                cache_misses: 1,
                skipped: 1,
                fallbacks: 0,
            }
        );
    }
}
