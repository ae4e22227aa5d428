//! Wall-clock helpers.
//!
//! Time-dependent checks take `now_ms` explicitly (`*_at` methods) and the
//! convenience wrappers read the clock here, so tests can pin time.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. A clock set before 1970 reads as 0.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
