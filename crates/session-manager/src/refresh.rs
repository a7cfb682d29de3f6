//! Refresh coordinator
//!
//! Turns a stored record's refresh token into a new `TokenRecord` with one
//! bounded call to the refresh endpoint. It never retries: a failed or timed
//! out attempt surfaces as `RefreshError` right away and the manager decides
//! what that means for the session. De-duplication of concurrent refreshes
//! lives in the manager, which owns the in-flight handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use session_auth::{Clock, SessionEndpoint, TokenRecord};
use tracing::{debug, info, warn};

use crate::error::RefreshError;

/// Default bound on one refresh endpoint call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RefreshCoordinator {
    endpoint: Arc<dyn SessionEndpoint>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    attempts: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(endpoint: Arc<dyn SessionEndpoint>, clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            endpoint,
            clock,
            timeout,
            attempts: AtomicU64::new(0),
        }
    }

    /// Exchange `current`'s refresh token for a new record.
    ///
    /// The new record keeps `current`'s token type, and its refresh token
    /// unless the endpoint rotated it. Expiry is computed from the endpoint's
    /// `expiresIn` at the time the response arrives.
    pub async fn refresh(&self, current: &TokenRecord) -> Result<TokenRecord, RefreshError> {
        let refresh_token = current
            .refresh_token
            .as_deref()
            .ok_or(RefreshError::NoRefreshToken)?;

        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(attempt, "calling refresh endpoint");

        let grant = match tokio::time::timeout(self.timeout, self.endpoint.refresh(refresh_token)).await
        {
            Ok(Ok(grant)) => grant,
            Ok(Err(e)) => {
                let err = RefreshError::from(e);
                warn!(error = %err, "refresh endpoint call failed");
                return Err(err);
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "refresh endpoint call timed out");
                return Err(RefreshError::Timeout(self.timeout));
            }
        };

        let now = self.clock.now_millis();
        let expires_at = now.saturating_add(grant.expires_in.as_millis() as u64);
        let rotated = grant.refresh_token.is_some();
        let record = TokenRecord::new(
            grant.access_token,
            grant.refresh_token.or_else(|| current.refresh_token.clone()),
            current.token_type.clone(),
            now,
            expires_at,
        )
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        info!(expires_at, rotated, "token refreshed");
        Ok(record)
    }

    /// Best-effort logout call, bounded by the same timeout as refresh.
    pub async fn logout(&self, auth_header: &str) -> Result<(), RefreshError> {
        match tokio::time::timeout(self.timeout, self.endpoint.logout(auth_header)).await {
            Ok(result) => result.map_err(RefreshError::from),
            Err(_) => Err(RefreshError::Timeout(self.timeout)),
        }
    }

    /// Refresh endpoint calls started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }
}
