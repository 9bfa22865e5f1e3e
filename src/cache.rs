//! Time-based memoization of feed responses.
//!
//! Repeated render cycles within the TTL reuse the last successful payload
//! for a location instead of hitting the network. Expiry is purely time
//! based: an entry whose age is `>= ttl` is refetched. Failures are never
//! stored, so the next cycle always retries a failed location.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::logging::{self, Component};
use crate::model::{AqiError, RawPayload};

#[derive(Debug, Clone)]
struct CachedFeed {
    fetched_at: DateTime<Utc>,
    payload: RawPayload,
}

/// Per-location cache of validated feed payloads.
#[derive(Debug, Clone)]
pub struct FeedCache {
    ttl: Duration,
    entries: HashMap<String, CachedFeed>,
}

impl FeedCache {
    pub fn new(ttl: Duration) -> Self {
        FeedCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached payload for `location_id` if it is still fresh at `now`.
    pub fn get_at(&self, location_id: &str, now: DateTime<Utc>) -> Option<&RawPayload> {
        self.entries
            .get(location_id)
            .filter(|c| now - c.fetched_at < self.ttl)
            .map(|c| &c.payload)
    }

    /// Returns the fresh cached payload, or calls `fetch` and caches its
    /// result if it succeeds.
    pub fn get_or_fetch_at<F>(
        &mut self,
        location_id: &str,
        now: DateTime<Utc>,
        fetch: F,
    ) -> Result<RawPayload, AqiError>
    where
        F: FnOnce() -> Result<RawPayload, AqiError>,
    {
        if let Some(payload) = self.get_at(location_id, now) {
            logging::debug(Component::Cache, Some(location_id), "cache hit");
            return Ok(payload.clone());
        }

        let payload = fetch()?;
        self.entries.insert(
            location_id.to_string(),
            CachedFeed {
                fetched_at: now,
                payload: payload.clone(),
            },
        );
        logging::debug(
            Component::Cache,
            Some(location_id),
            &format!("cached until {}", (now + self.ttl).format("%H:%M:%S UTC")),
        );
        Ok(payload)
    }

    pub fn invalidate(&mut self, location_id: &str) {
        self.entries.remove(location_id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::cell::Cell;

    fn payload(location_id: &str, aqi: u32) -> RawPayload {
        RawPayload {
            location_id: location_id.to_string(),
            body: json!({ "status": "ok", "data": { "aqi": aqi } }),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_hit_within_ttl_does_not_refetch() {
        let mut cache = FeedCache::new(Duration::seconds(600));
        let calls = Cell::new(0);
        let fetch = |aqi| {
            calls.set(calls.get() + 1);
            Ok(payload("antalya", aqi))
        };

        let first = cache.get_or_fetch_at("antalya", t0(), || fetch(50)).unwrap();
        let second = cache
            .get_or_fetch_at("antalya", t0() + Duration::seconds(599), || fetch(99))
            .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_expires_at_ttl() {
        let mut cache = FeedCache::new(Duration::seconds(600));
        cache
            .get_or_fetch_at("antalya", t0(), || Ok(payload("antalya", 50)))
            .unwrap();
        let refreshed = cache
            .get_or_fetch_at("antalya", t0() + Duration::seconds(600), || {
                Ok(payload("antalya", 99))
            })
            .unwrap();
        assert_eq!(refreshed.body["data"]["aqi"], 99);
    }

    #[test]
    fn test_keyed_by_location() {
        let mut cache = FeedCache::new(Duration::seconds(600));
        cache
            .get_or_fetch_at("antalya", t0(), || Ok(payload("antalya", 50)))
            .unwrap();
        let izmir = cache
            .get_or_fetch_at("izmir", t0(), || Ok(payload("izmir", 80)))
            .unwrap();
        assert_eq!(izmir.location_id, "izmir");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let mut cache = FeedCache::new(Duration::seconds(600));
        let result = cache.get_or_fetch_at("antalya", t0(), || {
            Err(AqiError::SourceUnavailable { status: None, cause: "timed out".into() })
        });
        assert!(result.is_err());
        assert!(cache.is_empty());

        let recovered = cache
            .get_or_fetch_at("antalya", t0() + Duration::seconds(1), || {
                Ok(payload("antalya", 50))
            })
            .unwrap();
        assert_eq!(recovered.body["data"]["aqi"], 50);
    }

    #[test]
    fn test_invalidate_forces_refetch() {
        let mut cache = FeedCache::new(Duration::seconds(600));
        cache
            .get_or_fetch_at("antalya", t0(), || Ok(payload("antalya", 50)))
            .unwrap();
        cache.invalidate("antalya");
        assert!(cache.get_at("antalya", t0()).is_none());
        cache
            .get_or_fetch_at("antalya", t0(), || Ok(payload("antalya", 50)))
            .unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
