//! Session token lifecycle manager
//!
//! Composes the `session-auth` primitives into the `TokenManager` façade that
//! every authenticated request goes through. The manager keeps a short-lived
//! decrypted copy of the current token in memory, falls back to the encrypted
//! store on a miss, and refreshes expired tokens transparently.
//!
//! Token lifecycle:
//! 1. Login hands the credential to `TokenManager::store_token` → Valid
//! 2. Callers ask `get_token` / `get_auth_header` before each request
//! 3. Expiry is detected on read; one shared refresh runs for all callers
//! 4. Refresh success → Valid again; refresh failure → Absent
//! 5. `remove_token` or `logout` → Absent from any state

pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod refresh;

#[cfg(test)]
mod test_support;

pub use cache::{CacheStats, DEFAULT_CACHE_TTL, MemoryCache};
pub use config::ManagerConfig;
pub use error::RefreshError;
pub use manager::TokenManager;
pub use refresh::{DEFAULT_REFRESH_TIMEOUT, RefreshCoordinator};
