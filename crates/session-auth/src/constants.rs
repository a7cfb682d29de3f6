//! Storage keys, endpoint paths, and defaults

use std::time::Duration;

/// Storage slot for the encrypted `TokenRecord`.
pub const TOKEN_KEY: &str = "secure_auth_token";

/// Storage slot for the encrypted `TokenMetadata`.
pub const METADATA_KEY: &str = "token_metadata";

/// Both storage slots, in write order.
pub const STORAGE_KEYS: [&str; 2] = [TOKEN_KEY, METADATA_KEY];

/// Token type used when the caller does not supply one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Lifetime applied when a stored token carries no expiry.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Refresh endpoint path, relative to the API base URL.
pub const REFRESH_PATH: &str = "/refresh";

/// Logout endpoint path, relative to the API base URL.
pub const LOGOUT_PATH: &str = "/logout";

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;
