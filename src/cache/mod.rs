//! In-memory TTL response cache.
//!
//! # Responsibilities
//! - key → (status, headers, payload, expiry) store with lazy TTL expiry
//! - Periodic sweep to reclaim memory proactively
//! - Hit/miss/size accounting for the stats surface
//!
//! # Design Decisions
//! - Keys are `{routeKind}:{method}:{upstreamURL}` so identical upstream
//!   resources reached via different route kinds never collide
//! - Read-through only: no proactive invalidation before TTL expiry;
//!   staleness up to the TTL is an accepted tradeoff
//! - TTL-only bounding, no byte ceiling or LRU; size accounting is an
//!   estimate used for reporting
//! - Writes are idempotent last-write-wins; DashMap gives per-shard
//!   consistency without a global lock

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;

use crate::lifecycle::Shutdown;

/// A cached upstream response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    /// Estimated memory footprint: body bytes plus header text.
    fn byte_size(&self) -> u64 {
        let header_bytes: usize = self.headers.iter().map(|(k, v)| k.len() + v.len()).sum();
        (self.body.len() + header_bytes) as u64
    }
}

/// Summary returned by [`ResponseCache::clear`].
#[derive(Debug, Serialize)]
pub struct ClearSummary {
    pub count: usize,
    pub bytes_freed: u64,
}

/// Snapshot returned by [`ResponseCache::stats`].
#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
    pub byte_size: u64,
    pub top_entries_by_size: Vec<(String, u64)>,
}

/// Thread-safe TTL response cache shared across in-flight requests.
#[derive(Clone, Default)]
pub struct ResponseCache {
    inner: Arc<DashMap<String, CacheEntry>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the canonical cache key for a request.
    pub fn key(route_kind: &str, method: &str, upstream_url: &str) -> String {
        format!("{route_kind}:{method}:{upstream_url}")
    }

    /// Look up an entry, expiring it lazily if its TTL has elapsed.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.inner.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            Some(entry) => {
                drop(entry);
                self.inner.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store an entry. Last write wins on concurrent misses for the same key.
    pub fn set(
        &self,
        key: String,
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
        ttl: Duration,
    ) {
        if ttl.is_zero() {
            return;
        }
        self.inner.insert(
            key,
            CacheEntry {
                status,
                headers,
                body,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Drop all entries, reporting how much was reclaimed.
    pub fn clear(&self) -> ClearSummary {
        let count = self.inner.len();
        let bytes_freed: u64 = self.inner.iter().map(|e| e.value().byte_size()).sum();
        self.inner.clear();
        tracing::info!(count, bytes_freed, "Cache cleared");
        ClearSummary { count, bytes_freed }
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let hit_count = self.hits.load(Ordering::Relaxed);
        let miss_count = self.misses.load(Ordering::Relaxed);
        let total = hit_count + miss_count;

        let mut sizes: Vec<(String, u64)> = self
            .inner
            .iter()
            .map(|e| (e.key().clone(), e.value().byte_size()))
            .collect();
        let byte_size = sizes.iter().map(|(_, s)| *s).sum();
        sizes.sort_by(|a, b| b.1.cmp(&a.1));
        sizes.truncate(5);

        CacheStats {
            entries: self.inner.len(),
            hit_count,
            miss_count,
            hit_rate: if total > 0 {
                hit_count as f64 / total as f64
            } else {
                0.0
            },
            byte_size,
            top_entries_by_size: sizes,
        }
    }

    /// Remove expired entries. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, entry| !entry.is_expired());
        before - self.inner.len()
    }

    /// Spawn the periodic sweep task.
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: &Shutdown) {
        let cache = self.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired cache entries");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Cache sweeper stopping");
                        break;
                    }
                }
            }
        });
    }
}
