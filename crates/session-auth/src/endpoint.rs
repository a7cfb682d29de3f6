//! Refresh and logout endpoint client
//!
//! Two backend interactions, both JSON over HTTP:
//! 1. `POST /refresh` with `{refreshToken}`; success is
//!    `{success: true, token, refreshToken?, expiresIn}` (seconds)
//! 2. `POST /logout` with the current `Authorization` header, best-effort
//!
//! Any response other than an explicit success is an error. Retrying is the
//! caller's decision; nothing here retries.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{LOGOUT_PATH, REFRESH_PATH};
use crate::error::{Error, Result};

/// Body of a refresh endpoint response.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until the new access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl RefreshResponse {
    /// Accept only an explicit success carrying a token and a positive lifetime.
    pub fn into_grant(self) -> Result<RefreshGrant> {
        if !self.success {
            return Err(Error::RefreshRejected(
                "endpoint reported success=false".into(),
            ));
        }
        let access_token = self
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidResponse("missing token".into()))?;
        let expires_in = match self.expires_in {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            Some(_) => return Err(Error::InvalidResponse("expiresIn must be positive".into())),
            None => return Err(Error::InvalidResponse("missing expiresIn".into())),
        };
        Ok(RefreshGrant {
            access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expires_in,
        })
    }
}

/// A validated refresh result.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    pub access_token: String,
    /// Rotated refresh token, if the backend issued one
    pub refresh_token: Option<String>,
    pub expires_in: Duration,
}

impl fmt::Debug for RefreshGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshGrant")
            .field("rotated", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Boxed future returned by endpoint operations.
pub type EndpointFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The backend's session endpoints.
pub trait SessionEndpoint: Send + Sync {
    /// Exchange a refresh token for a new access token. One attempt per call.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> EndpointFuture<'a, RefreshGrant>;

    /// Tell the backend the session is over.
    fn logout<'a>(&'a self, auth_header: &'a str) -> EndpointFuture<'a, ()>;
}

/// `SessionEndpoint` over reqwest.
pub struct HttpSessionEndpoint {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionEndpoint {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_refresh(&self, refresh_token: &str) -> Result<RefreshGrant> {
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&serde_json::json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(|e| Error::Http(format!("refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            // 401/403 means the refresh token is revoked, expired, or already used
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::RefreshRejected(format!(
                    "refresh endpoint returned {status}: {body}"
                )));
            }
            return Err(Error::Http(format!(
                "refresh endpoint returned {status}: {body}"
            )));
        }

        let body = response
            .json::<RefreshResponse>()
            .await
            .map_err(|e| Error::InvalidResponse(format!("invalid refresh response: {e}")))?;
        let grant = body.into_grant()?;
        debug!(
            expires_in_secs = grant.expires_in.as_secs(),
            rotated = grant.refresh_token.is_some(),
            "refresh endpoint issued new token"
        );
        Ok(grant)
    }

    async fn post_logout(&self, auth_header: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(LOGOUT_PATH))
            .header(reqwest::header::AUTHORIZATION, auth_header)
            .send()
            .await
            .map_err(|e| Error::Http(format!("logout request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!("logout endpoint returned {status}")));
        }
        Ok(())
    }
}

impl SessionEndpoint for HttpSessionEndpoint {
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> EndpointFuture<'a, RefreshGrant> {
        Box::pin(self.post_refresh(refresh_token))
    }

    fn logout<'a>(&'a self, auth_header: &'a str) -> EndpointFuture<'a, ()> {
        Box::pin(self.post_logout(auth_header))
    }
}
