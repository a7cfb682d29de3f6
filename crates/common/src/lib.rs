//! Shared types for the session workspace
//!
//! `Secret` wraps key material and credentials so they never reach logs;
//! `Error` covers configuration loading for binaries built on the session
//! crates.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
