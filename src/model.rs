//! Core data types for the air-quality monitoring service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the raw feed payload, the normalized `Snapshot`, the narrower
//! `HistoryEntry` projection, and the `AqiError` taxonomy.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Name of the environment variable (and secrets-store key) holding the
/// WAQI API token.
pub const TOKEN_KEY: &str = "WAQI_TOKEN";

/// Opaque WAQI API token.
///
/// The token is never printed: `Debug` renders a redacted placeholder so a
/// stray `{:?}` in a log line cannot leak it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Credential(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Raw payload
// ---------------------------------------------------------------------------

/// A feed response that passed envelope validation (`status == "ok"`),
/// paired with the location id it was requested for.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPayload {
    pub location_id: String,
    pub body: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Identifier for a monitored place plus a human label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    /// WAQI city or station id, e.g. `"antalya"` or `"@4018"`.
    pub id: String,
    pub label: String,
}

/// WGS84 position used for map placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// The overall index as reported upstream.
///
/// WAQI reports `"-"` instead of a number when a station has no current
/// index; that case is kept distinct rather than coerced to a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AqiValue {
    Available(u32),
    Unavailable,
}

impl AqiValue {
    pub fn value(&self) -> Option<u32> {
        match self {
            AqiValue::Available(v) => Some(*v),
            AqiValue::Unavailable => None,
        }
    }
}

impl fmt::Display for AqiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AqiValue::Available(v) => write!(f, "{}", v),
            AqiValue::Unavailable => write!(f, "-"),
        }
    }
}

/// One normalized reading for a location.
///
/// Fields are private: a snapshot is immutable once built by the normalizer.
/// Identity for deduplication is `(location.id, observed_at)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    location: Location,
    observed_at: DateTime<Utc>,
    overall_index: AqiValue,
    components: BTreeMap<String, f64>,
    coordinates: Coordinates,
}

impl Snapshot {
    /// Builds a snapshot. Component keys are upper-cased here so the
    /// lookup contract holds for every construction path.
    pub fn new(
        location: Location,
        observed_at: DateTime<Utc>,
        overall_index: AqiValue,
        components: BTreeMap<String, f64>,
        coordinates: Coordinates,
    ) -> Self {
        let components = components
            .into_iter()
            .map(|(code, value)| (code.to_uppercase(), value))
            .collect();
        Snapshot {
            location,
            observed_at,
            overall_index,
            components,
            coordinates,
        }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn overall_index(&self) -> AqiValue {
        self.overall_index
    }

    /// Pollutant code (upper-case) → concentration, verbatim from upstream.
    pub fn components(&self) -> &BTreeMap<String, f64> {
        &self.components
    }

    pub fn component(&self, code: &str) -> Option<f64> {
        self.components.get(&code.to_uppercase()).copied()
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    /// True when both snapshots describe the same reading.
    pub fn same_reading(&self, other: &Snapshot) -> bool {
        self.location.id == other.location.id && self.observed_at == other.observed_at
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// A ledger entry: the narrow projection of a `Snapshot` kept in session
/// history. Component detail is not retained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub location_id: String,
    pub observed_at: DateTime<Utc>,
    pub overall_index: AqiValue,
}

impl From<&Snapshot> for HistoryEntry {
    fn from(snapshot: &Snapshot) -> Self {
        HistoryEntry {
            location_id: snapshot.location.id.clone(),
            observed_at: snapshot.observed_at,
            overall_index: snapshot.overall_index,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while resolving credentials, fetching the feed,
/// or normalizing its payload.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AqiError {
    /// Missing or invalid configuration, including the API token.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network or transport failure, timeout, or a non-2xx response.
    #[error("Source unavailable{}: {cause}", http_suffix(.status))]
    SourceUnavailable { status: Option<u16>, cause: String },

    /// The provider answered but reported a business-level error
    /// (unknown location, invalid key, ...). Detail is kept verbatim.
    #[error("Source rejected request: {0}")]
    SourceRejected(String),

    /// The payload does not have the expected shape.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

fn http_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl AqiError {
    /// Only transport-level failures are worth retrying; everything else
    /// needs a change of input or configuration first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AqiError::SourceUnavailable { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
