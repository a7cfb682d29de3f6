//! Tunables for `TokenManager`

use std::time::Duration;

use session_auth::DEFAULT_TOKEN_LIFETIME;

use crate::cache::DEFAULT_CACHE_TTL;
use crate::refresh::DEFAULT_REFRESH_TIMEOUT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// How long a decrypted token may be served from memory
    pub cache_ttl: Duration,
    /// Upper bound on one refresh endpoint call
    pub refresh_timeout: Duration,
    /// Lifetime given to stored tokens that carry no expiry
    pub default_lifetime: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            default_lifetime: DEFAULT_TOKEN_LIFETIME,
        }
    }
}
