//! Presentation adapter.
//!
//! Turns a `LocationReading` into a `LocationPanel`: the headline metric,
//! component bars, the trend series and a map marker. Which parts are built
//! is controlled by `DashboardConfig`; there is one adapter for every
//! layout. `render_text` draws a panel for the terminal, and panels are
//! serializable for any other host.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::severity::UNAVAILABLE_COLOR;
use crate::config::DashboardConfig;
use crate::history::BOOTSTRAP_ENTRIES;
use crate::model::{AqiError, AqiValue, Location};
use crate::pipeline::LocationReading;

/// Width of the longest component bar in `render_text`.
const BAR_WIDTH: usize = 30;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

// ---------------------------------------------------------------------------
// Panel types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headline {
    pub label: String,
    pub index: AqiValue,
    pub band_label: Option<&'static str>,
    pub color: &'static str,
    /// Upstream observation time, e.g. `01 May 2024 12:00 UTC`.
    pub updated_at: String,
    pub stale: bool,
    pub age_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentBar {
    pub code: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub at: DateTime<Utc>,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Trend {
    /// Session history inside the window.
    Series(Vec<TrendPoint>),
    /// Not enough history yet: a flat line at the current index.
    WarmingUp(Vec<TrendPoint>),
    /// No current index to draw a placeholder at.
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub color: &'static str,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationPanel {
    pub location_id: String,
    pub headline: Headline,
    pub components: Option<Vec<ComponentBar>>,
    pub trend: Option<Trend>,
    pub marker: Option<MapMarker>,
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

pub fn build_panel(reading: &LocationReading, config: &DashboardConfig) -> LocationPanel {
    let snapshot = &reading.snapshot;
    let color = reading.band.map(|b| b.color).unwrap_or(UNAVAILABLE_COLOR);

    let headline = Headline {
        label: reading.location.label.clone(),
        index: snapshot.overall_index(),
        band_label: reading.band.map(|b| b.label),
        color,
        updated_at: snapshot.observed_at().format("%d %b %Y %H:%M UTC").to_string(),
        stale: reading.stale,
        age_minutes: reading.age_minutes,
    };

    let components = config.show_components.then(|| {
        snapshot
            .components()
            .iter()
            .map(|(code, value)| ComponentBar {
                code: code.clone(),
                value: *value,
            })
            .collect()
    });

    let trend = config.show_trend.then(|| build_trend(reading));

    let marker = config.show_map.then(|| {
        let coords = snapshot.coordinates();
        MapMarker {
            latitude: coords.latitude,
            longitude: coords.longitude,
            color,
            popup: format!("{} AQI: {}", reading.location.label, snapshot.overall_index()),
        }
    });

    LocationPanel {
        location_id: reading.location.id.clone(),
        headline,
        components,
        trend,
        marker,
    }
}

/// A series once the window holds enough numeric readings, otherwise a flat
/// placeholder at the current index.
fn build_trend(reading: &LocationReading) -> Trend {
    let points: Vec<TrendPoint> = reading
        .history
        .iter()
        .filter_map(|e| {
            e.overall_index.value().map(|index| TrendPoint {
                at: e.observed_at,
                index,
            })
        })
        .collect();
    if points.len() >= BOOTSTRAP_ENTRIES {
        return Trend::Series(points);
    }

    match reading.snapshot.overall_index() {
        AqiValue::Available(index) => Trend::WarmingUp(vec![
            TrendPoint {
                at: reading
                    .refreshed_at
                    .checked_sub_signed(reading.window)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
                index,
            },
            TrendPoint {
                at: reading.refreshed_at,
                index,
            },
        ]),
        AqiValue::Unavailable => Trend::NoData,
    }
}

// ---------------------------------------------------------------------------
// Terminal rendering
// ---------------------------------------------------------------------------

pub fn render_text(panel: &LocationPanel) -> String {
    let h = &panel.headline;
    let mut out = String::new();

    out.push_str(&format!("── {} ──\n", h.label));
    match h.band_label {
        Some(band) => out.push_str(&format!("  AQI {}  {} ({})\n", h.index, band, h.color)),
        None => out.push_str("  AQI -  no current index reported\n"),
    }
    out.push_str(&format!("  Last update: {}", h.updated_at));
    if h.stale {
        out.push_str(&format!("  (stale: {} min old)", h.age_minutes));
    }
    out.push('\n');

    if let Some(components) = &panel.components {
        out.push_str("  Components:\n");
        if components.is_empty() {
            out.push_str("    (no pollutant breakdown reported)\n");
        }
        let max = components.iter().map(|c| c.value).fold(0.0_f64, f64::max);
        for c in components {
            let len = if max > 0.0 {
                ((c.value / max) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            out.push_str(&format!("    {:<5} {:>7.1} {}\n", c.code, c.value, "█".repeat(len)));
        }
    }

    if let Some(trend) = &panel.trend {
        match trend {
            Trend::Series(points) => {
                out.push_str(&format!("  Trend: {} ({} readings)\n", sparkline(points), points.len()))
            }
            Trend::WarmingUp(_) => out.push_str("  Trend: collecting data for the trend view…\n"),
            Trend::NoData => out.push_str("  Trend: no data\n"),
        }
    }

    if let Some(m) = &panel.marker {
        out.push_str(&format!(
            "  Map: {:.4}, {:.4}  {}  \"{}\"\n",
            m.latitude, m.longitude, m.color, m.popup
        ));
    }

    out
}

fn sparkline(points: &[TrendPoint]) -> String {
    let min = points.iter().map(|p| p.index).min().unwrap_or(0);
    let max = points.iter().map(|p| p.index).max().unwrap_or(0);
    let span = (max - min).max(1) as f64;
    points
        .iter()
        .map(|p| {
            let level = (((p.index - min) as f64 / span) * (SPARK_LEVELS.len() - 1) as f64).round();
            SPARK_LEVELS[level as usize]
        })
        .collect()
}

/// A one-line banner for a failed location. Transient failures read as a
/// temporary condition; the rest carry the detail needed to fix them.
pub fn render_error(location: &Location, err: &AqiError) -> String {
    match err {
        AqiError::SourceUnavailable { .. } => format!(
            "── {} ──\n  ⚠ Data source temporarily unavailable, will retry on next refresh ({})\n",
            location.label, err
        ),
        AqiError::SourceRejected(detail) => format!(
            "── {} ──\n  ✗ Provider rejected the request: {}\n",
            location.label, detail
        ),
        AqiError::MalformedPayload(detail) => format!(
            "── {} ──\n  ✗ Unexpected data format from provider: {}\n",
            location.label, detail
        ),
        AqiError::Configuration(detail) => format!(
            "── {} ──\n  ✗ Configuration problem: {}\n",
            location.label, detail
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::severity::classify_value;
    use crate::model::{Coordinates, HistoryEntry, Snapshot};
    use chrono::{Duration, TimeZone};
    use std::collections::BTreeMap;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn reading(index: AqiValue, history: Vec<(i64, AqiValue)>) -> LocationReading {
        let location = Location {
            id: "antalya".to_string(),
            label: "Antalya".to_string(),
        };
        let mut comps = BTreeMap::new();
        comps.insert("PM25".to_string(), 57.0);
        comps.insert("O3".to_string(), 12.0);
        let snapshot = Snapshot::new(
            location.clone(),
            t0(),
            index,
            comps,
            Coordinates { latitude: 36.8969, longitude: 30.7133 },
        );
        let history: Vec<HistoryEntry> = history
            .into_iter()
            .map(|(h, v)| HistoryEntry {
                location_id: "antalya".to_string(),
                observed_at: t0() + Duration::hours(h),
                overall_index: v,
            })
            .collect();
        LocationReading {
            location,
            band: classify_value(index),
            bootstrapped: history.len() >= 2,
            history,
            snapshot,
            stale: false,
            age_minutes: 5,
            refreshed_at: t0() + Duration::minutes(5),
            window: Duration::hours(24),
        }
    }

    #[test]
    fn test_full_panel() {
        let r = reading(
            AqiValue::Available(57),
            vec![(-1, AqiValue::Available(50)), (0, AqiValue::Available(57))],
        );
        let panel = build_panel(&r, &DashboardConfig::default());

        assert_eq!(panel.headline.band_label, Some("Moderate"));
        assert_eq!(panel.headline.color, "#ffde33");
        assert_eq!(panel.headline.updated_at, "01 May 2024 12:00 UTC");

        let codes: Vec<_> = panel.components.as_ref().unwrap().iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["O3", "PM25"]);

        match panel.trend.as_ref().unwrap() {
            Trend::Series(points) => {
                assert_eq!(points.iter().map(|p| p.index).collect::<Vec<_>>(), vec![50, 57])
            }
            other => panic!("expected series, got {:?}", other),
        }

        let marker = panel.marker.as_ref().unwrap();
        assert_eq!(marker.color, "#ffde33");
        assert_eq!(marker.popup, "Antalya AQI: 57");
        assert_eq!(marker.latitude, 36.8969);
    }

    #[test]
    fn test_warming_up_gives_flat_placeholder() {
        let r = reading(AqiValue::Available(57), vec![(0, AqiValue::Available(57))]);
        let panel = build_panel(&r, &DashboardConfig::default());
        match panel.trend.unwrap() {
            Trend::WarmingUp(points) => {
                assert_eq!(points.len(), 2);
                assert!(points.iter().all(|p| p.index == 57));
                assert_eq!(points[1].at - points[0].at, Duration::hours(24));
            }
            other => panic!("expected warming up, got {:?}", other),
        }
    }

    #[test]
    fn test_single_windowed_point_stays_warming_up() {
        // The ledger held two readings, but only one is inside the window.
        let mut r = reading(AqiValue::Available(57), vec![(0, AqiValue::Available(57))]);
        r.bootstrapped = true;
        assert!(matches!(
            build_panel(&r, &DashboardConfig::default()).trend,
            Some(Trend::WarmingUp(_))
        ));
    }

    #[test]
    fn test_one_numeric_point_among_unavailable_is_warming_up() {
        let r = reading(
            AqiValue::Available(60),
            vec![(-1, AqiValue::Unavailable), (0, AqiValue::Available(60))],
        );
        assert!(matches!(
            build_panel(&r, &DashboardConfig::default()).trend,
            Some(Trend::WarmingUp(_))
        ));
    }

    #[test]
    fn test_unavailable_index_renders_without_band() {
        let r = reading(AqiValue::Unavailable, vec![(0, AqiValue::Unavailable)]);
        let panel = build_panel(&r, &DashboardConfig::default());
        assert_eq!(panel.headline.band_label, None);
        assert_eq!(panel.headline.color, UNAVAILABLE_COLOR);
        assert_eq!(panel.trend, Some(Trend::NoData));
        assert_eq!(panel.marker.unwrap().popup, "Antalya AQI: -");
    }

    #[test]
    fn test_unavailable_history_points_are_skipped() {
        let r = reading(
            AqiValue::Available(60),
            vec![
                (-2, AqiValue::Available(40)),
                (-1, AqiValue::Unavailable),
                (0, AqiValue::Available(60)),
            ],
        );
        match build_panel(&r, &DashboardConfig::default()).trend.unwrap() {
            Trend::Series(points) => assert_eq!(points.len(), 2),
            other => panic!("expected series, got {:?}", other),
        }
    }

    #[test]
    fn test_config_disables_sections() {
        let r = reading(AqiValue::Available(57), vec![]);
        let config = DashboardConfig {
            show_components: false,
            show_trend: false,
            show_map: false,
        };
        let panel = build_panel(&r, &config);
        assert!(panel.components.is_none());
        assert!(panel.trend.is_none());
        assert!(panel.marker.is_none());

        let text = render_text(&panel);
        assert!(text.contains("AQI 57"));
        assert!(!text.contains("Components"));
        assert!(!text.contains("Map:"));
    }

    #[test]
    fn test_render_text_mentions_everything() {
        let mut r = reading(
            AqiValue::Available(180),
            vec![(-1, AqiValue::Available(150)), (0, AqiValue::Available(180))],
        );
        r.stale = true;
        r.age_minutes = 240;
        let text = render_text(&build_panel(&r, &DashboardConfig::default()));
        assert!(text.contains("Antalya"));
        assert!(text.contains("Unhealthy"));
        assert!(text.contains("stale: 240 min old"));
        assert!(text.contains("PM25"));
        assert!(text.contains("2 readings"));
        assert!(text.contains("Antalya AQI: 180"));
    }

    #[test]
    fn test_sparkline_spans_levels() {
        let points: Vec<TrendPoint> = [10, 20, 30]
            .iter()
            .map(|&index| TrendPoint { at: t0(), index })
            .collect();
        assert_eq!(sparkline(&points), "▁▅█");
        let flat = vec![TrendPoint { at: t0(), index: 42 }; 3];
        assert_eq!(sparkline(&flat), "▁▁▁");
    }

    #[test]
    fn test_error_banners_distinguish_kinds() {
        let loc = Location {
            id: "antalya".to_string(),
            label: "Antalya".to_string(),
        };
        let transient = render_error(
            &loc,
            &AqiError::SourceUnavailable { status: None, cause: "request timed out".into() },
        );
        assert!(transient.contains("temporarily unavailable"));
        let rejected = render_error(&loc, &AqiError::SourceRejected("Invalid key".into()));
        assert!(rejected.contains("Invalid key"));
        let malformed = render_error(&loc, &AqiError::MalformedPayload("data.aqi: missing".into()));
        assert!(malformed.contains("data.aqi: missing"));
    }
}
