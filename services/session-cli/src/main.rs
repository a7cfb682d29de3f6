//! Session CLI
//!
//! Operator front end for the token manager:
//! 1. Loads config and the encryption key
//! 2. Opens the encrypted session file
//! 3. Runs one command against a `TokenManager`
//! 4. Optionally prints the session counters in Prometheus text format

mod cli;
mod config;
mod error;
mod metrics;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use session_auth::{Codec, FileStore, HttpSessionEndpoint, StaticKey};
use session_manager::TokenManager;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, USAGE};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // JSON logs on stderr; stdout carries command output only
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match Cli::parse(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            return Ok(ExitCode::from(2));
        }
    };

    let prometheus = if cli.metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let manager = build_manager(&config).await?;
    let code = run(cli.command, &manager).await?;

    if let Some(handle) = prometheus {
        print!("{}", handle.render());
    }
    Ok(code)
}

async fn build_manager(config: &Config) -> Result<TokenManager> {
    let key = StaticKey::from_base64(config.encryption_key()?.expose())?;
    let codec = Codec::new(&key).context("encryption key rejected")?;

    let store = FileStore::load(config.storage.path.clone())
        .await
        .with_context(|| format!("failed to open {}", config.storage.path.display()))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.endpoint.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;
    let endpoint = HttpSessionEndpoint::new(client, config.endpoint.base_url.clone());

    info!(
        store = %config.storage.path.display(),
        base_url = %config.endpoint.base_url,
        "session manager ready"
    );
    Ok(TokenManager::new(
        Arc::new(store),
        codec,
        Arc::new(endpoint),
        config.manager_config(),
    ))
}

async fn run(command: Command, manager: &TokenManager) -> Result<ExitCode> {
    match command {
        Command::Login(login) => {
            if !manager.store_token(login.into_input()).await {
                error!("login rejected; see preceding log lines");
                return Ok(ExitCode::FAILURE);
            }
            println!("session stored");
        }
        Command::Token { reload } => {
            let token = if reload {
                manager.reload_token().await
            } else {
                manager.get_token().await
            };
            let Some(token) = token else {
                eprintln!("no valid session");
                return Ok(ExitCode::FAILURE);
            };
            println!("{token}");
        }
        Command::Header => {
            let Some(header) = manager.get_auth_header().await else {
                eprintln!("no valid session");
                return Ok(ExitCode::FAILURE);
            };
            println!("{header}");
        }
        Command::Status => {
            let valid = manager.is_token_valid().await;
            let metadata = manager.get_token_metadata().await;
            let status = serde_json::json!({
                "valid": valid,
                "issuedAt": metadata.as_ref().map(|m| m.issued_at),
                "expiresAt": metadata.as_ref().map(|m| m.expires_at),
                "tokenType": metadata.as_ref().map(|m| m.token_type.as_str()),
                "hasRefreshToken": metadata.as_ref().is_some_and(|m| m.has_refresh_token()),
                "cache": manager.get_cache_stats(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Logout => {
            manager.logout().await;
            println!("logged out");
        }
        Command::Remove => {
            manager.remove_token().await;
            println!("session removed");
        }
    }
    Ok(ExitCode::SUCCESS)
}
