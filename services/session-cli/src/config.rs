//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The encryption key is loaded from SESSION_ENCRYPTION_KEY or key_file and
//! is never stored in the TOML directly.

use common::Secret;
use serde::Deserialize;
use session_manager::ManagerConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env var holding the base64-encoded 32-byte encryption key
pub const KEY_ENV: &str = "SESSION_ENCRYPTION_KEY";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Where the encrypted session lives and how to unlock it
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
    /// Path to a file containing the base64 key (alternative to SESSION_ENCRYPTION_KEY)
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    #[serde(skip)]
    pub encryption_key: Option<Secret<String>>,
}

/// Backend session endpoints
#[derive(Debug, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    /// Overall timeout for one HTTP request
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

/// Token manager tunables
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,
    #[serde(default = "default_lifetime")]
    pub default_lifetime_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            refresh_timeout_secs: default_refresh_timeout(),
            default_lifetime_secs: default_lifetime(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_cache_ttl() -> u64 {
    ManagerConfig::default().cache_ttl.as_secs()
}

fn default_refresh_timeout() -> u64 {
    ManagerConfig::default().refresh_timeout.as_secs()
}

fn default_lifetime() -> u64 {
    ManagerConfig::default().default_lifetime.as_secs()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Key resolution order:
    /// 1. SESSION_ENCRYPTION_KEY env var
    /// 2. key_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let Ok(key) = std::env::var(KEY_ENV) {
            let key = key.trim().to_owned();
            if !key.is_empty() {
                config.storage.encryption_key = Some(Secret::new(key));
            }
        } else if let Some(ref key_file) = config.storage.key_file {
            let key = std::fs::read_to_string(key_file).map_err(|e| {
                common::Error::MissingKey(format!(
                    "failed to read key_file {}: {e}",
                    key_file.display()
                ))
            })?;
            let key = key.trim().to_owned();
            if !key.is_empty() {
                config.storage.encryption_key = Some(Secret::new(key));
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.endpoint.base_url.starts_with("http://")
            && !self.endpoint.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.endpoint.base_url
            )));
        }
        if self.endpoint.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if self.session.refresh_timeout_secs == 0 {
            return Err(common::Error::Config(
                "refresh_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.session.default_lifetime_secs == 0 {
            return Err(common::Error::Config(
                "default_lifetime_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// The key, or an error naming both places it could have come from.
    pub fn encryption_key(&self) -> common::Result<&Secret<String>> {
        self.storage.encryption_key.as_ref().ok_or_else(|| {
            common::Error::MissingKey(format!("set {KEY_ENV} or storage.key_file"))
        })
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            cache_ttl: Duration::from_secs(self.session.cache_ttl_secs),
            refresh_timeout: Duration::from_secs(self.session.refresh_timeout_secs),
            default_lifetime: Duration::from_secs(self.session.default_lifetime_secs),
        }
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("session-cli.toml")
    }
}
