//! Snapshot staleness detection.
//!
//! WAQI city feeds normally update hourly. A station outage doesn't surface
//! as an error: the feed keeps returning the last reading with its old
//! timestamp. This module flags such readings so the dashboard can say so.
//!
//! # Clock injection
//! `is_stale_at` takes `now: DateTime<Utc>` rather than calling
//! `Utc::now()` internally, which keeps staleness deterministic in tests.

use chrono::{DateTime, Utc};

use crate::model::Snapshot;

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Age of the reading relative to `now`, in whole minutes. Readings stamped
/// in the future (upstream clock skew) have age zero.
pub fn age_minutes_at(snapshot: &Snapshot, now: DateTime<Utc>) -> u64 {
    (now - snapshot.observed_at()).num_minutes().max(0) as u64
}

/// Returns `true` if the reading is older than `max_age_minutes` relative to
/// `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
pub fn is_stale_at(snapshot: &Snapshot, max_age_minutes: u64, now: DateTime<Utc>) -> bool {
    age_minutes_at(snapshot, now) > max_age_minutes
}

/// Convenience wrapper that uses the real current time.
/// Use `is_stale_at` in tests to keep them deterministic.
pub fn is_stale(snapshot: &Snapshot, max_age_minutes: u64) -> bool {
    is_stale_at(snapshot, max_age_minutes, Utc::now())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
