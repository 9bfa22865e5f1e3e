//! Location Verification Module
//!
//! Checks configured locations against the feed to determine which ones are
//! reachable and reporting a usable index. Backs the diagnostic invocation
//! of the `aqmon` binary (`aqmon <location id>`).

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::ingest::waqi::FeedSource;
use crate::model::{AqiError, AqiValue, Credential, Location, RawPayload};
use crate::normalize;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub results: Vec<LocationVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationSummary {
    pub total: usize,
    pub working: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationVerification {
    pub location_id: String,
    pub label: String,
    pub status: VerificationStatus,
    /// The feed answered with a well-formed envelope (ok or rejected).
    pub api_responsive: bool,
    /// The payload normalized into a snapshot.
    pub payload_valid: bool,
    pub overall_index: Option<String>,
    pub observed_at: Option<String>,
    pub components_available: Vec<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    /// Valid payload with an index and a pollutant breakdown.
    Success,
    /// Valid payload, but no current index or no components.
    PartialSuccess,
    Failed,
}

// ============================================================================
// Single location
// ============================================================================

/// Assesses an already-performed fetch for `location`.
pub fn inspect_fetch(
    location: &Location,
    fetched: &Result<RawPayload, AqiError>,
) -> LocationVerification {
    let mut result = LocationVerification {
        location_id: location.id.clone(),
        label: location.label.clone(),
        status: VerificationStatus::Failed,
        api_responsive: false,
        payload_valid: false,
        overall_index: None,
        observed_at: None,
        components_available: Vec::new(),
        error_message: None,
    };

    let raw = match fetched {
        Ok(raw) => raw,
        Err(e) => {
            result.api_responsive = matches!(e, AqiError::SourceRejected(_));
            result.error_message = Some(e.to_string());
            return result;
        }
    };
    result.api_responsive = true;

    match normalize::normalize(raw) {
        Ok(snapshot) => {
            result.payload_valid = true;
            result.overall_index = Some(snapshot.overall_index().to_string());
            result.observed_at = Some(snapshot.observed_at().to_rfc3339());
            result.components_available = snapshot.components().keys().cloned().collect();

            let has_index = snapshot.overall_index() != AqiValue::Unavailable;
            result.status = if has_index && !result.components_available.is_empty() {
                VerificationStatus::Success
            } else {
                VerificationStatus::PartialSuccess
            };
        }
        Err(e) => {
            result.error_message = Some(e.to_string());
        }
    }

    result
}

/// Fetches and assesses one location.
pub fn verify_location(
    source: &dyn FeedSource,
    credential: &Credential,
    location: &Location,
) -> LocationVerification {
    inspect_fetch(location, &source.fetch_raw(&location.id, credential))
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn run_verification(
    source: &dyn FeedSource,
    credential: &Credential,
    locations: &[Location],
) -> VerificationReport {
    let results: Vec<LocationVerification> = locations
        .iter()
        .map(|loc| verify_location(source, credential, loc))
        .collect();
    summarize(results)
}

/// Wraps verification results in a timestamped report.
pub fn summarize(results: Vec<LocationVerification>) -> VerificationReport {
    let failed = results
        .iter()
        .filter(|r| r.status == VerificationStatus::Failed)
        .count();
    VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        summary: VerificationSummary {
            total: results.len(),
            working: results.len() - failed,
            failed,
        },
        results,
    }
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    for r in &report.results {
        match r.status {
            VerificationStatus::Success => println!(
                "  ✓ {} ({}): AQI {} at {}, components {:?}",
                r.label,
                r.location_id,
                r.overall_index.as_deref().unwrap_or("-"),
                r.observed_at.as_deref().unwrap_or("?"),
                r.components_available
            ),
            VerificationStatus::PartialSuccess => println!(
                "  ⚠ {} ({}): AQI {}, components {:?}",
                r.label,
                r.location_id,
                r.overall_index.as_deref().unwrap_or("-"),
                r.components_available
            ),
            VerificationStatus::Failed => println!(
                "  ✗ {} ({}): {}",
                r.label,
                r.location_id,
                r.error_message.as_deref().unwrap_or("Unknown")
            ),
        }
    }
    println!();
    println!(
        "Locations: {}/{} working  ({} failed)",
        report.summary.working, report.summary.total, report.summary.failed
    );
    println!("═══════════════════════════════════════════════════════════");
}
