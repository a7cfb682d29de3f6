//! Session credential primitives
//!
//! Leaf components of the session token lifecycle: the token data model,
//! authenticated encryption of records at rest, durable key-value storage
//! for the encrypted blobs, and the HTTP client for the refresh and logout
//! endpoints. The `session-manager` crate composes these into the
//! `TokenManager` façade.
//!
//! Storage layout:
//! 1. `secure_auth_token` holds the whole encrypted `TokenRecord`
//! 2. `token_metadata` holds encrypted `TokenMetadata` (expiry, issue time,
//!    refresh token, token type) for cheap validity checks

pub mod clock;
pub mod codec;
pub mod constants;
pub mod endpoint;
pub mod error;
pub mod record;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use codec::{Codec, KeyProvider, StaticKey};
pub use constants::*;
pub use endpoint::{HttpSessionEndpoint, RefreshGrant, RefreshResponse, SessionEndpoint};
pub use error::{Error, Result};
pub use record::{TokenInput, TokenMetadata, TokenRecord};
pub use store::{FileStore, MemoryStore, PersistentStore};
