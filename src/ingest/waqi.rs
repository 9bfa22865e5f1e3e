//! WAQI (World Air Quality Index) feed client
//!
//! Retrieves the current reading for a city or station from the WAQI
//! "feed by location" endpoint.
//!
//! API Documentation: https://aqicn.org/json-api/doc/
//! Endpoint: https://api.waqi.info/feed/<location>/?token=<token>
//!
//! The provider reports business errors (unknown station, invalid key)
//! inside a 200 response whose `status` is not `"ok"`. Those are kept apart
//! from transport failures: the former become `SourceRejected`, the latter
//! `SourceUnavailable`.

use std::time::Duration;

use crate::logging::{self, Component};
use crate::model::{AqiError, Credential, RawPayload};

/// Literal `status` value of a successful feed response.
pub const STATUS_OK: &str = "ok";

// ============================================================================
// Feed source seam
// ============================================================================

/// Anything that can produce a validated feed payload for a location.
///
/// `WaqiClient` talks to the live API; `dev_mode::FixtureSource` replays
/// saved responses.
pub trait FeedSource {
    fn fetch_raw(&self, location_id: &str, credential: &Credential)
        -> Result<RawPayload, AqiError>;

    /// Whether `fetch_raw` needs a real API token.
    fn requires_credential(&self) -> bool {
        true
    }
}

// ============================================================================
// URL construction
// ============================================================================

/// Builds the feed URL for a location. The id is embedded as-is, since WAQI
/// ids contain `/` and `@` that are part of the route.
pub fn build_feed_url(api_root: &str, location_id: &str, credential: &Credential) -> String {
    format!(
        "{}/{}/?token={}",
        api_root.trim_end_matches('/'),
        location_id,
        credential.token()
    )
}

/// The feed URL with the token replaced, safe for log output.
pub fn redacted_feed_url(api_root: &str, location_id: &str) -> String {
    format!("{}/{}/?token=***", api_root.trim_end_matches('/'), location_id)
}

// ============================================================================
// Response interpretation
// ============================================================================

/// Maps an HTTP status and body to a validated payload.
///
/// - non-2xx → `SourceUnavailable` with the status code
/// - body not JSON, or no string `status` field → `MalformedPayload`
/// - `status != "ok"` → `SourceRejected` with the embedded `data` detail
pub fn interpret_feed_response(
    location_id: &str,
    http_status: u16,
    body: &str,
) -> Result<RawPayload, AqiError> {
    if !(200..300).contains(&http_status) {
        return Err(AqiError::SourceUnavailable {
            status: Some(http_status),
            cause: summarize_body(body),
        });
    }

    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| AqiError::MalformedPayload(format!("response is not JSON: {}", e)))?;

    let status = json
        .get("status")
        .and_then(|s| s.as_str())
        .ok_or_else(|| AqiError::MalformedPayload("missing string field 'status'".to_string()))?;

    if status != STATUS_OK {
        let detail = match json.get("data") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => format!("status '{}' without detail", status),
            Some(other) => other.to_string(),
        };
        return Err(AqiError::SourceRejected(detail));
    }

    Ok(RawPayload {
        location_id: location_id.to_string(),
        body: json,
    })
}

/// First line of an error body, capped so an HTML error page doesn't flood
/// the log.
fn summarize_body(body: &str) -> String {
    let line = body.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return "empty response body".to_string();
    }
    line.chars().take(200).collect()
}

// ============================================================================
// Live client
// ============================================================================

/// Blocking client for the live WAQI API. Performs no retries.
pub struct WaqiClient {
    client: reqwest::blocking::Client,
    api_root: String,
}

impl WaqiClient {
    /// Builds a client whose requests time out after `timeout`.
    pub fn new(api_root: &str, timeout: Duration) -> Result<Self, AqiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AqiError::Configuration(format!("cannot build HTTP client: {}", e)))?;
        Ok(WaqiClient {
            client,
            api_root: api_root.to_string(),
        })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }
}

impl FeedSource for WaqiClient {
    fn fetch_raw(
        &self,
        location_id: &str,
        credential: &Credential,
    ) -> Result<RawPayload, AqiError> {
        let url = build_feed_url(&self.api_root, location_id, credential);
        logging::debug(
            Component::Waqi,
            Some(location_id),
            &format!("GET {}", redacted_feed_url(&self.api_root, location_id)),
        );

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| AqiError::SourceUnavailable {
                status: e.status().map(|s| s.as_u16()),
                cause: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    // reqwest errors embed the URL, token included
                    format!("request failed: {}", e.without_url())
                },
            })?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| AqiError::SourceUnavailable {
            status: Some(status),
            cause: format!("failed to read response body: {}", e.without_url()),
        })?;

        interpret_feed_response(location_id, status, &body)
    }
}

// ============================================================================
// Tests
// ============================================================================
