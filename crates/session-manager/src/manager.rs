//! `TokenManager`: the façade every authenticated call goes through
//!
//! Read path: memory cache → persistent store + decryption → refresh if the
//! stored token has expired. All failures are handled here and logged; the
//! only signal callers see is "token present" or "token absent".
//!
//! Concurrency model:
//! - A session *generation* counter is bumped by every login
//!   (`store_token`), every completed refresh, and every termination
//!   (`remove_token`, failed refresh, corrupt blob). Work started under an
//!   older generation never writes back: a refresh that lands after logout
//!   is discarded.
//! - Concurrent callers that find the same expired record share one refresh
//!   (single-flight). The first caller spawns the refresh task and installs
//!   a shared handle to it; later callers await a clone of that handle.
//! - Store mutations are serialized by an async write lock, so the last
//!   completed write wins. Each mutation bumps the generation after its
//!   store write and before touching the cache; readers only warm the cache
//!   if the generation they read under is still current.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use session_auth::{
    Clock, Codec, METADATA_KEY, PersistentStore, STORAGE_KEYS, SessionEndpoint, SystemClock,
    TOKEN_KEY, TokenInput, TokenMetadata, TokenRecord,
};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, MemoryCache};
use crate::config::ManagerConfig;
use crate::error::RefreshError;
use crate::metrics;
use crate::refresh::RefreshCoordinator;

type SharedRefresh = Shared<BoxFuture<'static, Result<TokenRecord, RefreshError>>>;

struct InFlight {
    id: u64,
    generation: u64,
    future: SharedRefresh,
}

/// What the token slot held on the last read.
enum Stored {
    Absent,
    Present(TokenRecord),
    Corrupt,
}

struct Inner {
    store: Arc<dyn PersistentStore>,
    codec: Codec,
    refresher: RefreshCoordinator,
    clock: Arc<dyn Clock>,
    config: ManagerConfig,
    cache: Mutex<MemoryCache>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    next_flight: AtomicU64,
    write_lock: tokio::sync::Mutex<()>,
}

/// Owner of the current session's token record.
///
/// Construct one per session at process start and hand clones to the
/// network layer; clones share state.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        codec: Codec,
        endpoint: Arc<dyn SessionEndpoint>,
        config: ManagerConfig,
    ) -> Self {
        Self::with_clock(store, codec, endpoint, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn PersistentStore>,
        codec: Codec,
        endpoint: Arc<dyn SessionEndpoint>,
        config: ManagerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let refresher = RefreshCoordinator::new(endpoint, clock.clone(), config.refresh_timeout);
        info!(
            cache_ttl_secs = config.cache_ttl.as_secs(),
            refresh_timeout_secs = config.refresh_timeout.as_secs(),
            "token manager initialized"
        );
        Self {
            inner: Arc::new(Inner {
                store,
                codec,
                refresher,
                clock,
                cache: Mutex::new(MemoryCache::new(config.cache_ttl)),
                config,
                in_flight: Mutex::new(None),
                generation: AtomicU64::new(0),
                next_flight: AtomicU64::new(0),
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Persist a new session credential and warm the cache.
    ///
    /// Returns `false` (and persists nothing new) when the input is invalid,
    /// encryption fails, or the store write fails. Supersedes any refresh
    /// still in flight for the previous session.
    pub async fn store_token(&self, input: TokenInput) -> bool {
        let inner = &self.inner;
        let now = inner.clock.now_millis();
        let record = match input.into_record(now, inner.config.default_lifetime) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "rejected token data");
                return false;
            }
        };

        let _write = inner.write_lock.lock().await;
        if let Err(e) = inner.persist(&record).await {
            warn!(error = %e, "failed to store token");
            return false;
        }
        inner.generation.fetch_add(1, Ordering::AcqRel);
        inner.lock_cache().set(record.clone(), inner.clock.now_millis());
        info!(expires_at = record.expires_at, "token stored");
        true
    }

    /// Current access token, refreshing it if it has expired.
    ///
    /// `None` means there is no usable session and the caller should treat
    /// the user as logged out.
    pub async fn get_token(&self) -> Option<String> {
        self.inner
            .current_record(false)
            .await
            .map(|record| record.access_token)
    }

    /// Like `get_token`, but skips the memory cache and reads the store.
    pub async fn reload_token(&self) -> Option<String> {
        self.inner
            .current_record(true)
            .await
            .map(|record| record.access_token)
    }

    /// `"{token_type} {access_token}"` for the `Authorization` header.
    pub async fn get_auth_header(&self) -> Option<String> {
        self.inner
            .current_record(false)
            .await
            .map(|record| record.auth_header())
    }

    /// Whether a stored, unexpired token exists.
    ///
    /// Reads the metadata slot; the access token blob is only decrypted when
    /// the metadata slot is missing. Never refreshes.
    pub async fn is_token_valid(&self) -> bool {
        let now = self.inner.clock.now_millis();
        self.inner
            .stored_metadata()
            .await
            .is_some_and(|metadata| !metadata.is_expired(now))
    }

    /// Expiry, issue time, token type, and refresh token of the stored
    /// session, without refreshing.
    pub async fn get_token_metadata(&self) -> Option<TokenMetadata> {
        self.inner.stored_metadata().await
    }

    /// Clear the stored session and the cache. Safe to call with nothing
    /// stored; a refresh still in flight is discarded when it lands.
    pub async fn remove_token(&self) {
        self.inner.remove().await;
    }

    /// Best-effort `POST /logout`, then local removal regardless of outcome.
    pub async fn logout(&self) {
        let record = self.inner.cached_or_stored_record().await;
        if let Some(header) = record.map(|r| r.auth_header()) {
            match self.inner.refresher.logout(&header).await {
                Ok(()) => debug!("logout endpoint acknowledged"),
                Err(e) => warn!(error = %e, "logout endpoint failed, clearing local session anyway"),
            }
        }
        self.inner.remove().await;
        info!("logged out");
    }

    /// Drop the decrypted copy held in memory. Storage is untouched.
    pub fn clear_memory_cache(&self) {
        self.inner.lock_cache().invalidate();
        debug!("memory cache cleared");
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        let now = self.inner.clock.now_millis();
        let mut stats = self.inner.lock_cache().stats(now);
        stats.refreshes = self.inner.refresher.attempts();
        stats
    }
}

impl Inner {
    fn lock_cache(&self) -> MutexGuard<'_, MemoryCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    async fn current_record(self: &Arc<Self>, bypass_cache: bool) -> Option<TokenRecord> {
        if !bypass_cache {
            let cached = self.lock_cache().get(self.clock.now_millis());
            metrics::record_cache_lookup(cached.is_some());
            if let Some(record) = cached {
                debug!("token served from memory cache");
                return Some(record);
            }
        }

        let generation = self.current_generation();
        let record = match self.load().await {
            Ok(Stored::Present(record)) => record,
            Ok(Stored::Absent) => {
                debug!("no stored token");
                return None;
            }
            Ok(Stored::Corrupt) => {
                warn!("stored token failed to decrypt, clearing session");
                metrics::record_decrypt_failure();
                self.terminate(generation).await;
                return None;
            }
            Err(e) => {
                warn!(error = %e, "failed to read token store");
                return None;
            }
        };

        if !record.is_expired(self.clock.now_millis()) {
            self.warm_cache(record.clone(), generation);
            return Some(record);
        }

        // At most one refresh per call: the refreshed record is returned
        // directly, never re-read and re-checked.
        info!(expires_at = record.expires_at, "stored token expired, refreshing");
        match self.join_refresh(record, generation).await {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(error = %e, "no token after refresh attempt");
                None
            }
        }
    }

    /// Cache `record` unless the session changed since it was read.
    fn warm_cache(&self, record: TokenRecord, generation: u64) {
        let mut cache = self.lock_cache();
        if self.current_generation() == generation {
            cache.set(record, self.clock.now_millis());
        }
    }

    async fn load(&self) -> session_auth::Result<Stored> {
        let values = self.store.get_many(&[TOKEN_KEY]).await?;
        match values.into_iter().next().flatten() {
            None => Ok(Stored::Absent),
            Some(blob) => Ok(self
                .codec
                .decrypt_record(&blob)
                .map_or(Stored::Corrupt, Stored::Present)),
        }
    }

    /// Cache first, then the store; no refresh and no cleanup.
    async fn cached_or_stored_record(&self) -> Option<TokenRecord> {
        let cached = self.lock_cache().get(self.clock.now_millis());
        if cached.is_some() {
            return cached;
        }
        match self.load().await {
            Ok(Stored::Present(record)) => Some(record),
            _ => None,
        }
    }

    /// Metadata of the stored session.
    ///
    /// A metadata slot without a token slot is a leftover and reads as
    /// absent; a token slot without metadata falls back to the record.
    async fn stored_metadata(&self) -> Option<TokenMetadata> {
        let values = match self.store.get_many(&STORAGE_KEYS).await {
            Ok(values) => values,
            Err(e) => {
                warn!(error = %e, "failed to read token store");
                return None;
            }
        };
        let mut values = values.into_iter();
        let token = values.next().flatten()?;
        match values.next().flatten() {
            Some(blob) => self.codec.decrypt_metadata(&blob),
            None => {
                debug!("metadata slot missing, reading token record");
                self.codec.decrypt_record(&token).map(|r| r.metadata())
            }
        }
    }

    /// Encrypt both slots and write them in one call.
    async fn persist(&self, record: &TokenRecord) -> session_auth::Result<()> {
        let token_blob = self.codec.encrypt_record(record)?;
        let metadata_blob = self.codec.encrypt_metadata(&record.metadata())?;
        self.store
            .set_many(vec![
                (TOKEN_KEY.to_string(), token_blob),
                (METADATA_KEY.to_string(), metadata_blob),
            ])
            .await
    }

    /// Await the in-flight refresh for `generation`, starting it if needed.
    ///
    /// A caller whose read predates a finished refresh (or a logout) finds
    /// the generation moved on and picks up the current record instead of
    /// spending the refresh token a second time.
    async fn join_refresh(
        self: &Arc<Self>,
        record: TokenRecord,
        generation: u64,
    ) -> Result<TokenRecord, RefreshError> {
        let joined = {
            let mut slot = self.lock_in_flight();
            match slot.as_ref() {
                Some(flight) if flight.generation == generation => {
                    debug!(flight = flight.id, "joining in-flight refresh");
                    Some(flight.future.clone())
                }
                _ if self.current_generation() != generation => None,
                _ => {
                    let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                    // Spawned so the refresh completes even if every waiter is cancelled
                    let task = tokio::spawn(Arc::clone(self).run_refresh(record, generation, id));
                    let future = async move {
                        task.await
                            .unwrap_or_else(|e| Err(RefreshError::Task(e.to_string())))
                    }
                    .boxed()
                    .shared();
                    *slot = Some(InFlight {
                        id,
                        generation,
                        future: future.clone(),
                    });
                    Some(future)
                }
            }
        };

        match joined {
            Some(future) => future.await,
            None => {
                debug!("session moved on since read, using current record");
                let now = self.clock.now_millis();
                self.cached_or_stored_record()
                    .await
                    .filter(|record| !record.is_expired(now))
                    .ok_or(RefreshError::Superseded)
            }
        }
    }

    /// Body of one shared refresh. Runs once per flight no matter how many
    /// callers await it.
    async fn run_refresh(
        self: Arc<Self>,
        record: TokenRecord,
        generation: u64,
        id: u64,
    ) -> Result<TokenRecord, RefreshError> {
        let outcome = self.refresher.refresh(&record).await;

        let result = {
            let _write = self.write_lock.lock().await;
            if self.current_generation() != generation {
                info!(flight = id, "session changed during refresh, discarding result");
                metrics::record_refresh("discarded");
                Err(RefreshError::Superseded)
            } else {
                match outcome {
                    Ok(refreshed) => {
                        if let Err(e) = self.persist(&refreshed).await {
                            warn!(error = %e, "failed to persist refreshed token");
                        }
                        self.generation.fetch_add(1, Ordering::AcqRel);
                        self.lock_cache()
                            .set(refreshed.clone(), self.clock.now_millis());
                        metrics::record_refresh("success");
                        Ok(refreshed)
                    }
                    Err(e) => {
                        warn!(error = %e, "refresh failed, ending session");
                        metrics::record_refresh("failure");
                        self.clear_locked().await;
                        Err(e)
                    }
                }
            }
        };

        let mut slot = self.lock_in_flight();
        if slot.as_ref().is_some_and(|flight| flight.id == id) {
            *slot = None;
        }
        result
    }

    /// Remove the session unconditionally.
    async fn remove(&self) {
        // Bump before waiting on the lock so in-flight work sees the change
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.lock_in_flight().take();
        let _write = self.write_lock.lock().await;
        self.clear_locked().await;
        info!("token removed");
    }

    /// Remove the session only if it is still the one read under `generation`.
    async fn terminate(&self, generation: u64) {
        let _write = self.write_lock.lock().await;
        if self.current_generation() != generation {
            debug!("session already replaced, skipping cleanup");
            return;
        }
        self.clear_locked().await;
    }

    /// Clear storage, then end the generation and drop the cached copy.
    /// Caller holds the write lock.
    async fn clear_locked(&self) {
        self.clear_storage().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.lock_cache().invalidate();
    }

    async fn clear_storage(&self) {
        if let Err(e) = self.store.remove_many(&STORAGE_KEYS).await {
            warn!(error = %e, "failed to remove stored token");
        }
    }
}
