//! Token data model
//!
//! A `TokenRecord` is created on login or on a successful refresh and is
//! always replaced wholesale. `TokenInput` is the validated shape callers
//! hand to the manager; it applies the defaulting rules (token type, expiry)
//! when converted into a record.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TOKEN_TYPE;
use crate::error::{Error, Result};

/// A complete session credential.
///
/// Invariants: `access_token` is non-empty and `expires_at > issued_at`.
/// Timestamps are unix milliseconds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

impl TokenRecord {
    /// Build a record, rejecting values that break the record invariants.
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        token_type: String,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<Self> {
        let record = Self {
            access_token,
            refresh_token,
            token_type,
            issued_at,
            expires_at,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(Error::InvalidRecord("access token is empty".into()));
        }
        if self.token_type.is_empty() {
            return Err(Error::InvalidRecord("token type is empty".into()));
        }
        if self.expires_at <= self.issued_at {
            return Err(Error::InvalidRecord(format!(
                "expires_at ({}) must be after issued_at ({})",
                self.expires_at, self.issued_at
            )));
        }
        Ok(())
    }

    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expires_at <= now_millis
    }

    /// `Authorization` header value, e.g. `Bearer abc123`.
    pub fn auth_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            refresh_token: self.refresh_token.clone(),
            token_type: self.token_type.clone(),
        }
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Everything about a stored session except the access token itself.
///
/// Persisted in its own slot so validity checks don't need to touch the
/// access token blob.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub issued_at: u64,
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
}

impl TokenMetadata {
    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expires_at <= now_millis
    }

    /// Time left before expiry; zero once expired.
    pub fn remaining(&self, now_millis: u64) -> Duration {
        Duration::from_millis(self.expires_at.saturating_sub(now_millis))
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl fmt::Debug for TokenMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenMetadata")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.has_refresh_token())
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Login data supplied by the caller of `store_token`.
///
/// Expiry resolution order: explicit `expires_at`, then `expires_in` from
/// the issue time, then the manager's default lifetime.
#[derive(Clone, Default)]
pub struct TokenInput {
    access_token: String,
    refresh_token: Option<String>,
    token_type: Option<String>,
    expires_at: Option<u64>,
    expires_in: Option<Duration>,
}

impl TokenInput {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Self::default()
        }
    }

    pub fn refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// Absolute expiry as unix milliseconds.
    pub fn expires_at(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn expires_in(mut self, expires_in: Duration) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Resolve defaults and validate into a `TokenRecord` issued at `now_millis`.
    ///
    /// Empty refresh tokens and token types are treated as absent.
    pub fn into_record(self, now_millis: u64, default_lifetime: Duration) -> Result<TokenRecord> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(delta)) => now_millis.saturating_add(delta.as_millis() as u64),
            (None, None) => now_millis.saturating_add(default_lifetime.as_millis() as u64),
        };
        let token_type = self
            .token_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());
        let refresh_token = self.refresh_token.filter(|t| !t.is_empty());

        TokenRecord::new(
            self.access_token,
            refresh_token,
            token_type,
            now_millis,
            expires_at,
        )
    }
}

impl fmt::Debug for TokenInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenInput")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_TOKEN_LIFETIME;

    const NOW: u64 = 1_760_000_000_000;

    #[test]
    fn input_defaults_to_bearer_and_seven_days() {
        let record = TokenInput::new("X")
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME)
            .unwrap();
        assert_eq!(record.token_type, "Bearer");
        assert_eq!(record.issued_at, NOW);
        assert_eq!(record.expires_at, NOW + 7 * 24 * 3600 * 1000);
        assert!(record.refresh_token.is_none());
    }

    #[test]
    fn explicit_expiry_wins_over_expires_in() {
        let record = TokenInput::new("A")
            .expires_at(NOW + 5_000)
            .expires_in(Duration::from_secs(3600))
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME)
            .unwrap();
        assert_eq!(record.expires_at, NOW + 5_000);
    }

    #[test]
    fn expires_in_is_relative_to_issue_time() {
        let record = TokenInput::new("A")
            .expires_in(Duration::from_secs(60))
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME)
            .unwrap();
        assert_eq!(record.expires_at, NOW + 60_000);
    }

    #[test]
    fn empty_access_token_is_rejected() {
        let err = TokenInput::new("")
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)), "got: {err:?}");
    }

    #[test]
    fn expiry_in_the_past_of_issue_is_rejected() {
        let result = TokenInput::new("A")
            .expires_at(NOW)
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME);
        assert!(result.is_err());
    }

    #[test]
    fn empty_optionals_are_treated_as_absent() {
        let record = TokenInput::new("A")
            .refresh_token("")
            .token_type("")
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME)
            .unwrap();
        assert!(record.refresh_token.is_none());
        assert_eq!(record.token_type, "Bearer");
    }

    #[test]
    fn auth_header_uses_token_type() {
        let record = TokenInput::new("abc")
            .token_type("Token")
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME)
            .unwrap();
        assert_eq!(record.auth_header(), "Token abc");
    }

    #[test]
    fn expiry_is_inclusive_of_now() {
        let record = TokenInput::new("A")
            .expires_at(NOW + 10)
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME)
            .unwrap();
        assert!(!record.is_expired(NOW + 9));
        assert!(record.is_expired(NOW + 10));
    }

    #[test]
    fn metadata_serializes_with_camel_case_keys() {
        let record = TokenInput::new("A")
            .refresh_token("R")
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME)
            .unwrap();
        let json = serde_json::to_string(&record.metadata()).unwrap();
        assert!(json.contains("\"issuedAt\""));
        assert!(json.contains("\"expiresAt\""));
        assert!(json.contains("\"refreshToken\":\"R\""));
        assert!(json.contains("\"tokenType\":\"Bearer\""));
        assert!(!json.contains("accessToken"));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let record = TokenInput::new("secret-access")
            .refresh_token("secret-refresh")
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME)
            .unwrap();
        let debug = format!("{record:?} {:?}", record.metadata());
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let metadata = TokenInput::new("A")
            .expires_at(NOW + 1_000)
            .into_record(NOW, DEFAULT_TOKEN_LIFETIME)
            .unwrap()
            .metadata();
        assert_eq!(metadata.remaining(NOW), Duration::from_secs(1));
        assert_eq!(metadata.remaining(NOW + 5_000), Duration::ZERO);
    }
}
