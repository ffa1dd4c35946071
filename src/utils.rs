//! Small shared utilities.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in nanoseconds since the Unix epoch.
///
/// Falls back to zero if the system clock is set before the epoch, which
/// keeps the function infallible for callers that only need a monotonicity
/// hint rather than an authoritative timestamp.
#[must_use]
pub fn current_time_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Returns the current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
