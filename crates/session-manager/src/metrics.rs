//! Session metrics
//!
//! - `session_cache_lookups_total` (counter): label `result` (hit|miss)
//! - `session_refresh_total` (counter): label `outcome` (success|failure|discarded)
//! - `session_decrypt_failures_total` (counter)
//!
//! No-ops until the host process installs a recorder.

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("session_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("session_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_decrypt_failure() {
    metrics::counter!("session_decrypt_failures_total").increment(1);
}
