//! Test doubles: a hand-driven clock, an instrumented store, and a scripted
//! session endpoint.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use session_auth::endpoint::EndpointFuture;
use session_auth::store::StoreFuture;
use session_auth::{Clock, Error, MemoryStore, PersistentStore, RefreshGrant, SessionEndpoint};

pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// `MemoryStore` wrapper that counts calls and can be told to fail writes.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    gets: AtomicUsize,
    sets: AtomicUsize,
    removes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Read a slot without touching the counters.
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.inner
            .get_many(&[key])
            .await
            .unwrap()
            .into_iter()
            .next()
            .flatten()
    }

    /// Write a slot without touching the counters.
    pub async fn put_raw(&self, key: &str, value: &str) {
        self.inner
            .set_many(vec![(key.to_string(), value.to_string())])
            .await
            .unwrap();
    }

    pub async fn remove_raw(&self, key: &str) {
        self.inner.remove_many(&[key]).await.unwrap();
    }
}

impl PersistentStore for CountingStore {
    fn set_many(&self, entries: Vec<(String, String)>) -> StoreFuture<'_, ()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Box::pin(async { Err(Error::Storage("disk full".into())) });
        }
        self.inner.set_many(entries)
    }

    fn get_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, Vec<Option<String>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_many(keys)
    }

    fn remove_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, ()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_many(keys)
    }
}

pub fn grant(access: &str, refresh: Option<&str>, expires_in_secs: u64) -> RefreshGrant {
    RefreshGrant {
        access_token: access.to_string(),
        refresh_token: refresh.map(String::from),
        expires_in: Duration::from_secs(expires_in_secs),
    }
}

/// Endpoint that replays queued refresh outcomes.
///
/// With no queued outcome, refresh is rejected. `delay` is applied before
/// answering so concurrent callers overlap; `hanging` never answers.
#[derive(Default)]
pub struct ScriptedEndpoint {
    outcomes: Mutex<VecDeque<session_auth::Result<RefreshGrant>>>,
    refresh_tokens: Mutex<Vec<String>>,
    logout_headers: Mutex<Vec<String>>,
    delay: Duration,
    hang: bool,
    fail_logout: bool,
}

impl ScriptedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn failing_logout(mut self) -> Self {
        self.fail_logout = true;
        self
    }

    pub fn push(&self, outcome: session_auth::Result<RefreshGrant>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_tokens.lock().unwrap().len()
    }

    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.refresh_tokens.lock().unwrap().clone()
    }

    pub fn logout_headers(&self) -> Vec<String> {
        self.logout_headers.lock().unwrap().clone()
    }
}

impl SessionEndpoint for ScriptedEndpoint {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> EndpointFuture<'a, RefreshGrant> {
        Box::pin(async move {
            self.refresh_tokens
                .lock()
                .unwrap()
                .push(refresh_token.to_string());
            if self.hang {
                std::future::pending::<()>().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let outcome = self.outcomes.lock().unwrap().pop_front();
            outcome.unwrap_or_else(|| Err(Error::RefreshRejected("no scripted outcome".into())))
        })
    }

    fn logout<'a>(&'a self, auth_header: &'a str) -> EndpointFuture<'a, ()> {
        Box::pin(async move {
            self.logout_headers
                .lock()
                .unwrap()
                .push(auth_header.to_string());
            if self.fail_logout {
                return Err(Error::Http("logout endpoint unavailable".into()));
            }
            Ok(())
        })
    }
}
