//! Prometheus exposition for `--metrics`
//!
//! The session counters are emitted by `session_manager::metrics`; this module
//! only installs the recorder and attaches help text.

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;
    describe();
    Ok(handle)
}

fn describe() {
    metrics::describe_counter!(
        "session_cache_lookups_total",
        "Token lookups served from (hit) or past (miss) the memory cache"
    );
    metrics::describe_counter!(
        "session_refresh_total",
        "Completed refresh attempts by outcome"
    );
    metrics::describe_counter!(
        "session_decrypt_failures_total",
        "Stored token blobs that failed to decrypt or validate"
    );
}
