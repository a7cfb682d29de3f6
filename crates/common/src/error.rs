//! Configuration errors shared by session binaries

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encryption key unavailable: {0}")]
    MissingKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        assert_eq!(
            Error::Config("base_url must be http(s)".into()).to_string(),
            "Configuration error: base_url must be http(s)"
        );
        assert_eq!(
            Error::MissingKey("SESSION_ENCRYPTION_KEY not set".into()).to_string(),
            "Encryption key unavailable: SESSION_ENCRYPTION_KEY not set"
        );
    }

    #[test]
    fn io_errors_convert() {
        let err: Error =
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file").into();
        assert!(err.to_string().starts_with("I/O error:"), "got: {err}");
    }
}
