//! Location registry for the air-quality monitoring service.
//!
//! Defines the canonical list of WAQI feeds monitored by this service,
//! along with their display labels. The
//! configuration file selects which of these (or any other WAQI id) are
//! polled; this registry supplies stable human labels for the known ones.

use crate::model::Location;

// ---------------------------------------------------------------------------
// Location metadata
// ---------------------------------------------------------------------------

/// Metadata for a single monitored WAQI feed.
pub struct MonitoredCity {
    /// WAQI city slug or `@<station number>`.
    pub id: &'static str,
    /// Display label used in the dashboard.
    pub label: &'static str,
}

/// Turkish cities with a city-level WAQI feed, the first entry being the
/// default when no locations are configured.
pub static LOCATION_REGISTRY: &[MonitoredCity] = &[
    MonitoredCity {
        id: "antalya",
        label: "Antalya",
    },
    MonitoredCity {
        id: "istanbul",
        label: "İstanbul",
    },
    MonitoredCity {
        id: "ankara",
        label: "Ankara",
    },
    MonitoredCity {
        id: "izmir",
        label: "İzmir",
    },
    MonitoredCity {
        id: "bursa",
        label: "Bursa",
    },
    MonitoredCity {
        id: "adana",
        label: "Adana",
    },
];

/// Looks up a registry entry by WAQI id. Returns `None` if not found.
pub fn find_city(id: &str) -> Option<&'static MonitoredCity> {
    LOCATION_REGISTRY.iter().find(|c| c.id == id)
}

/// The registry label for `id`, if the id is known.
pub fn label_for(id: &str) -> Option<&'static str> {
    find_city(id).map(|c| c.label)
}

/// The location polled when the configuration lists none.
pub fn default_location() -> Location {
    let city = &LOCATION_REGISTRY[0];
    Location {
        id: city.id.to_string(),
        label: city.label.to_string(),
    }
}

/// Checks the shape of a WAQI feed id: either a lowercase city slug
/// (`antalya`, `istanbul/besiktas`) or `@` followed by a station number.
pub fn is_valid_feed_id(id: &str) -> bool {
    if let Some(number) = id.strip_prefix('@') {
        return !number.is_empty() && number.chars().all(|c| c.is_ascii_digit());
    }
    !id.is_empty()
        && !id.starts_with('/')
        && !id.ends_with('/')
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '/')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
