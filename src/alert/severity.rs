//! AQI severity classification.
//!
//! Maps an overall index to one of the six EPA-style bands. The table
//! partitions `[0, ∞)` with no gaps; the last band is open-ended, so any
//! index beyond the scale lands in the worst band instead of failing.

use serde::Serialize;

use crate::model::{AqiError, AqiValue};

/// Severity levels, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

/// A named range of index values sharing a display color and health label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityBand {
    pub severity: Severity,
    pub lower: u32,
    /// Inclusive upper bound; `None` for the open-ended last band.
    pub upper: Option<u32>,
    pub color: &'static str,
    pub label: &'static str,
}

impl SeverityBand {
    pub fn contains(&self, index: u32) -> bool {
        index >= self.lower && self.upper.is_none_or(|upper| index <= upper)
    }
}

/// Marker color used when the index is unavailable.
pub const UNAVAILABLE_COLOR: &str = "#999999";

/// EPA breakpoints: 0–50, 51–100, 101–150, 151–200, 201–300, 301+.
pub static SEVERITY_BANDS: &[SeverityBand] = &[
    SeverityBand {
        severity: Severity::Good,
        lower: 0,
        upper: Some(50),
        color: "#009966",
        label: "Good",
    },
    SeverityBand {
        severity: Severity::Moderate,
        lower: 51,
        upper: Some(100),
        color: "#ffde33",
        label: "Moderate",
    },
    SeverityBand {
        severity: Severity::UnhealthyForSensitiveGroups,
        lower: 101,
        upper: Some(150),
        color: "#ff9933",
        label: "Unhealthy for Sensitive Groups",
    },
    SeverityBand {
        severity: Severity::Unhealthy,
        lower: 151,
        upper: Some(200),
        color: "#cc0033",
        label: "Unhealthy",
    },
    SeverityBand {
        severity: Severity::VeryUnhealthy,
        lower: 201,
        upper: Some(300),
        color: "#660099",
        label: "Very Unhealthy",
    },
    SeverityBand {
        severity: Severity::Hazardous,
        lower: 301,
        upper: None,
        color: "#7e0023",
        label: "Hazardous",
    },
];

/// Returns the band containing `index`, falling back to the worst band.
pub fn classify(index: u32) -> &'static SeverityBand {
    SEVERITY_BANDS
        .iter()
        .find(|band| band.contains(index))
        .unwrap_or(&SEVERITY_BANDS[SEVERITY_BANDS.len() - 1])
}

/// Like `classify`, for callers holding a signed value. A negative index
/// never comes from the feed, so it is reported as a caller bug.
pub fn classify_signed(index: i64) -> Result<&'static SeverityBand, AqiError> {
    if index < 0 {
        return Err(AqiError::Configuration(format!(
            "AQI index must be non-negative, got {}",
            index
        )));
    }
    Ok(classify(u32::try_from(index).unwrap_or(u32::MAX)))
}

/// The band for a reported index; `None` when the station had no index.
pub fn classify_value(value: AqiValue) -> Option<&'static SeverityBand> {
    value.value().map(classify)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
