//! Result Cache Store
//!
//! Bounded, TTL-governed map from request fingerprint to a computed result.
//! Expired entries are dropped lazily when a read finds them; capacity
//! pressure evicts the entry with the oldest `stored_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::debug;

use super::config::CacheConfig;
use super::key::{derive_key, CacheKey};
use crate::clock::{elapsed_between, Clock, SystemClock};
use crate::error::Result;
use crate::metrics;

#[derive(Debug)]
struct CacheEntry<V> {
    result: Arc<V>,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        elapsed_between(self.stored_at, now) > self.ttl
    }
}

/// Introspection snapshot of a result cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries physically present
    pub size: usize,

    /// Capacity
    pub max_size: usize,

    /// Entry time-to-live in milliseconds
    pub ttl_ms: u64,

    /// Body bytes hashed into each key
    pub body_prefix_bytes: usize,

    /// Entries past their TTL that no read has removed yet. Informational
    /// only; it says nothing about hit rate.
    pub expired_entries: usize,
}

/// In-memory result cache
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: RwLock<HashMap<CacheKey, CacheEntry<V>>>,
    max_size: usize,
    ttl: Duration,
    body_prefix: usize,
    clock: Arc<dyn Clock>,
}

impl<V> ResultCache<V> {
    /// Create a cache on the system clock
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache on a custom clock
    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            entries: RwLock::new(HashMap::with_capacity(config.max_size.min(4096))),
            max_size: config.max_size,
            ttl: config.ttl(),
            body_prefix: config.body_prefix_bytes,
            clock,
        })
    }

    /// Fingerprint a request with this cache's body prefix
    pub fn key_for<I, K, H>(&self, headers: I, body: &[u8]) -> CacheKey
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: AsRef<[u8]>,
    {
        derive_key(headers, body, self.body_prefix)
    }

    /// Look up the stored result for a request
    pub fn get<I, K, H>(&self, headers: I, body: &[u8]) -> Option<Arc<V>>
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: AsRef<[u8]>,
    {
        let key = self.key_for(headers, body);
        self.get_by_key(&key)
    }

    /// Look up a result by a precomputed key
    pub fn get_by_key(&self, key: &CacheKey) -> Option<Arc<V>> {
        let now = self.clock.now();

        {
            let entries = self.read();
            match entries.get(key) {
                None => {
                    metrics::CACHE_LOOKUPS_TOTAL.with_label_values(&["miss"]).inc();
                    return None;
                }
                Some(entry) if !entry.is_expired(now) => {
                    metrics::CACHE_LOOKUPS_TOTAL.with_label_values(&["hit"]).inc();
                    return Some(Arc::clone(&entry.result));
                }
                Some(_) => {}
            }
        }

        // Expired under the read lock. Re-check under the write lock, since a
        // fresh result may have been stored in between.
        let mut entries = self.write();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                metrics::CACHE_LOOKUPS_TOTAL.with_label_values(&["hit"]).inc();
                Some(Arc::clone(&entry.result))
            }
            Some(_) => {
                entries.remove(key);
                metrics::CACHE_LOOKUPS_TOTAL.with_label_values(&["expired"]).inc();
                metrics::CACHE_ENTRIES.set(entries.len() as i64);
                debug!(key = %key, "Dropped expired cache entry");
                None
            }
            None => {
                metrics::CACHE_LOOKUPS_TOTAL.with_label_values(&["miss"]).inc();
                None
            }
        }
    }

    /// Store the result computed for a request
    pub fn set<I, K, H>(&self, headers: I, body: &[u8], result: V) -> Arc<V>
    where
        I: IntoIterator<Item = (K, H)>,
        K: AsRef<str>,
        H: AsRef<[u8]>,
    {
        let key = self.key_for(headers, body);
        let result = Arc::new(result);
        self.set_by_key(key, Arc::clone(&result));
        result
    }

    /// Store a result under a precomputed key.
    ///
    /// When the cache is full and `key` is new, one entry with the smallest
    /// `stored_at` is evicted first. Ties are broken arbitrarily.
    pub fn set_by_key(&self, key: CacheKey, result: Arc<V>) {
        let now = self.clock.now();
        let mut entries = self.write();

        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                metrics::CACHE_EVICTIONS_TOTAL.inc();
                debug!(evicted = %oldest, "Evicted oldest cache entry");
            }
        }

        entries.insert(
            key,
            CacheEntry {
                result,
                stored_at: now,
                ttl: self.ttl,
            },
        );
        metrics::CACHE_ENTRIES.set(entries.len() as i64);
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.write();
        let removed = entries.len();
        entries.clear();
        metrics::CACHE_ENTRIES.set(0);
        removed
    }

    /// Entries physically present, expired ones included
    pub fn size(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let (size, expired_entries) = {
            let entries = self.read();
            let expired = entries.values().filter(|e| e.is_expired(now)).count();
            (entries.len(), expired)
        };

        CacheStats {
            size,
            max_size: self.max_size,
            ttl_ms: self.ttl.as_millis() as u64,
            body_prefix_bytes: self.body_prefix,
            expired_entries,
        }
    }

    // Critical sections never leave the map half-updated, so poisoned locks
    // are recovered rather than propagated.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
