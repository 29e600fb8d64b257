//! In-memory response store
//!
//! Provides a `CacheStore` mapping cache keys to captured responses, with
//! lazy TTL expiry and bulk invalidation by group, action or id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

/// The store shared by every client in the process
static GLOBAL_STORE: Lazy<Arc<CacheStore>> = Lazy::new(|| Arc::new(CacheStore::new()));

/// One captured response
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Response payload
    pub data: Value,
    /// Response status code
    pub status: u16,
    /// Invalidation group tag
    pub group: Option<String>,
    /// Invalidation action tag
    pub action: Option<String>,
    /// When the entry stops being served, `None` for never
    pub expires_at: Option<DateTime<Utc>>,
    /// When the entry was captured
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Captures a response now, expiring after `lifetime` if one is given
    ///
    /// A lifetime too large to represent as a calendar instant is treated
    /// as no lifetime at all.
    pub fn new(data: Value, status: u16, lifetime: Option<Duration>) -> Self {
        let now = Utc::now();
        let expires_at = lifetime
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| now.checked_add_signed(ttl));

        Self {
            data,
            status,
            group: None,
            action: None,
            expires_at,
            cached_at: now,
        }
    }

    /// Attaches the group and action tags used by [`CacheStore::invalidate`]
    pub fn tagged(mut self, group: Option<&str>, action: Option<&str>) -> Self {
        self.group = group.map(str::to_string);
        self.action = action.map(str::to_string);
        self
    }

    /// Whether the entry has passed its expiry instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    fn matches(&self, group: Option<&str>, action: Option<&str>) -> bool {
        let group_matches = group.map_or(true, |g| self.group.as_deref() == Some(g));
        let action_matches = action.map_or(true, |a| self.action.as_deref() == Some(a));
        group_matches && action_matches
    }
}

/// Response handed back to callers, whether served from cache or network
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Response payload
    pub data: Value,
    /// Response status code
    pub status: u16,
    /// Whether the response was served from the cache
    pub is_cache: bool,
    /// When the served entry was captured, only set for cache hits
    pub cached_at: Option<DateTime<Utc>>,
}

impl Envelope {
    /// Wraps a response that just came back from the network
    pub fn fresh(data: Value, status: u16) -> Self {
        Self {
            data,
            status,
            is_cache: false,
            cached_at: None,
        }
    }

    /// Deserializes the payload into a typed value
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

impl From<&CacheEntry> for Envelope {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            data: entry.data.clone(),
            status: entry.status,
            is_cache: true,
            cached_at: Some(entry.cached_at),
        }
    }
}

/// Counters updated by store reads
#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time view of the store counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStatsSnapshot {
    /// Reads served from the store
    pub hits: u64,
    /// Reads that found nothing, including expired entries
    pub misses: u64,
    /// Entries removed because they expired
    pub evictions: u64,
    /// Entries currently stored
    pub size: usize,
}

impl CacheStatsSnapshot {
    /// Fraction of reads that were hits, 0.0 when nothing was read yet
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Maps cache keys to captured responses
///
/// There is no size bound and no background sweep. Entries live until they
/// are read after their expiry instant or are invalidated explicitly.
/// Every operation completes without yielding, so a read or write is never
/// observed half-done.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: DashMap<String, CacheEntry>,
    stats: CacheStats,
}

impl CacheStore {
    /// Creates an empty store, isolated from the global one
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store shared by the whole process
    pub fn global() -> Arc<CacheStore> {
        Arc::clone(&GLOBAL_STORE)
    }

    /// Stores `entry` under `key`, replacing whatever was there
    pub fn put(&self, key: &str, entry: CacheEntry) {
        debug!(
            key,
            status = entry.status,
            expires_at = ?entry.expires_at,
            "storing response"
        );
        self.entries.insert(key.to_string(), entry);
    }

    /// Reads the entry stored under `key`
    ///
    /// An entry past its expiry instant is removed and reported as absent.
    /// The returned envelope is an owned copy; changing it never changes
    /// what the store holds.
    pub fn get(&self, key: &str) -> Option<Envelope> {
        let now = Utc::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Envelope::from(entry.value()));
            }
            Some(_) => {}
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }

        // Re-check under the write lock: a concurrent put may have replaced
        // the stale entry since the read above.
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key, "evicted stale entry");
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Removes entries by tag and returns how many were removed
    ///
    /// With no arguments every entry is removed. With one argument, entries
    /// carrying that group (or action) are removed. With both, only entries
    /// carrying both tags are removed.
    pub fn invalidate(&self, group: Option<&str>, action: Option<&str>) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.matches(group, action) {
                removed += 1;
                false
            } else {
                true
            }
        });
        info!(?group, ?action, removed, "invalidated cache entries");
        removed
    }

    /// Removes the entry stored under `id`, returning whether one existed
    pub fn invalidate_by_id(&self, id: &str) -> bool {
        let removed = self.entries.remove(id).is_some();
        debug!(id, removed, "invalidated cache entry by id");
        removed
    }

    /// Removes every expired entry and returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired_at(now) {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            self.stats
                .evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Whether an entry is stored under `key`, expired or not
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }

    /// Drops every entry and zeroes the counters
    pub fn reset(&self) {
        self.entries.clear();
        self.stats.reset();
    }
}
