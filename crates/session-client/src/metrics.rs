//! Session client counters
//!
//! - `session_requests_total` (counter): label `classification`
//! - `session_refresh_total` (counter): label `outcome`
//! - `session_refresh_waiters_total` (counter): calls that queued behind a renewal
//! - `session_retries_total` (counter): calls re-issued with a renewed token
//!
//! Without an installed recorder these are no-ops.

use transport::Classification;

/// Record a finished transport call by classification.
pub fn record_request(classification: Classification) {
    metrics::counter!("session_requests_total", "classification" => classification.label())
        .increment(1);
}

/// Record the end of a renewal attempt: `success`, `failure` or `abandoned`.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("session_refresh_total", "outcome" => outcome).increment(1);
}

pub fn record_refresh_waiter() {
    metrics::counter!("session_refresh_waiters_total").increment(1);
}

pub fn record_retry() {
    metrics::counter!("session_retries_total").increment(1);
}
