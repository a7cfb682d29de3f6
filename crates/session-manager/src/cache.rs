//! In-memory TTL cache of the decrypted token record
//!
//! Saves a store read and a decryption on every authenticated call. An entry
//! is served only while it is younger than the TTL *and* its token has not
//! expired; anything else reads as a miss and the caller reloads from the
//! persistent store. Pure in-memory state, no I/O.

use std::time::Duration;

use serde::Serialize;
use session_auth::TokenRecord;

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry {
    record: TokenRecord,
    cached_at: u64,
}

impl CacheEntry {
    fn age(&self, now_millis: u64) -> u64 {
        now_millis.saturating_sub(self.cached_at)
    }

    fn is_valid(&self, now_millis: u64, ttl_millis: u64) -> bool {
        self.age(now_millis) < ttl_millis && now_millis < self.record.expires_at
    }
}

/// Snapshot for observability and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub cached: bool,
    pub age_ms: Option<u64>,
    pub ttl_ms: u64,
    /// An entry is held but would no longer be served
    pub expired: bool,
    pub hits: u64,
    pub misses: u64,
    /// Refresh endpoint calls made by the owning manager
    pub refreshes: u64,
}

#[derive(Debug)]
pub struct MemoryCache {
    ttl: Duration,
    entry: Option<CacheEntry>,
    hits: u64,
    misses: u64,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: None,
            hits: 0,
            misses: 0,
        }
    }

    fn ttl_millis(&self) -> u64 {
        self.ttl.as_millis() as u64
    }

    /// The cached record if it is still servable. Stale entries are dropped.
    pub fn get(&mut self, now_millis: u64) -> Option<TokenRecord> {
        let ttl = self.ttl_millis();
        match &self.entry {
            Some(entry) if entry.is_valid(now_millis, ttl) => {
                self.hits += 1;
                Some(entry.record.clone())
            }
            Some(_) => {
                self.entry = None;
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn set(&mut self, record: TokenRecord, now_millis: u64) {
        self.entry = Some(CacheEntry {
            record,
            cached_at: now_millis,
        });
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn stats(&self, now_millis: u64) -> CacheStats {
        let ttl_ms = self.ttl_millis();
        CacheStats {
            cached: self.entry.is_some(),
            age_ms: self.entry.as_ref().map(|e| e.age(now_millis)),
            ttl_ms,
            expired: self
                .entry
                .as_ref()
                .is_some_and(|e| !e.is_valid(now_millis, ttl_ms)),
            hits: self.hits,
            misses: self.misses,
            refreshes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_760_000_000_000;

    fn record(expires_at: u64) -> TokenRecord {
        TokenRecord::new("at".into(), None, "Bearer".into(), NOW, expires_at).unwrap()
    }

    #[test]
    fn empty_cache_misses() {
        let mut cache = MemoryCache::new(DEFAULT_CACHE_TTL);
        assert!(cache.get(NOW).is_none());
        assert_eq!(cache.stats(NOW).misses, 1);
    }

    #[test]
    fn serves_until_ttl_elapses() {
        let mut cache = MemoryCache::new(Duration::from_secs(300));
        cache.set(record(NOW + 3_600_000), NOW);

        assert!(cache.get(NOW + 299_999).is_some());
        assert!(cache.get(NOW + 300_000).is_none());
        // Stale entry was dropped on the miss
        assert!(!cache.stats(NOW).cached);
    }

    #[test]
    fn never_serves_an_expired_token() {
        let mut cache = MemoryCache::new(Duration::from_secs(300));
        cache.set(record(NOW + 5_000), NOW);

        assert!(cache.get(NOW + 4_999).is_some());
        assert!(cache.get(NOW + 5_000).is_none());
    }

    #[test]
    fn invalidate_clears_entry() {
        let mut cache = MemoryCache::new(DEFAULT_CACHE_TTL);
        cache.set(record(NOW + 3_600_000), NOW);
        cache.invalidate();
        assert!(cache.get(NOW).is_none());
    }

    #[test]
    fn set_replaces_and_restarts_ttl() {
        let mut cache = MemoryCache::new(Duration::from_secs(300));
        cache.set(record(NOW + 3_600_000), NOW);
        let mut newer = record(NOW + 7_200_000);
        newer.access_token = "at_2".into();
        cache.set(newer, NOW + 200_000);

        let served = cache.get(NOW + 400_000).unwrap();
        assert_eq!(served.access_token, "at_2");
    }

    #[test]
    fn stats_report_age_and_staleness() {
        let mut cache = MemoryCache::new(Duration::from_secs(300));
        cache.set(record(NOW + 3_600_000), NOW);
        assert!(cache.get(NOW + 1_000).is_some());

        let fresh = cache.stats(NOW + 1_000);
        assert!(fresh.cached);
        assert_eq!(fresh.age_ms, Some(1_000));
        assert_eq!(fresh.ttl_ms, 300_000);
        assert!(!fresh.expired);
        assert_eq!((fresh.hits, fresh.misses), (1, 0));

        let stale = cache.stats(NOW + 301_000);
        assert!(stale.cached);
        assert!(stale.expired);
    }
}
