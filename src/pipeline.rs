//! The render cycle.
//!
//! One refresh of one location runs to completion on the caller's thread:
//!
//!   credential → cached fetch (with retry) → normalize → session history
//!   → severity + staleness → `LocationReading`
//!
//! Errors propagate typed; nothing here substitutes a default reading for a
//! failed one. Keeping the last good reading on screen, if wanted, is up to
//! the presentation host.

use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use crate::alert::severity::{self, SeverityBand};
use crate::alert::stalenesses;
use crate::cache::FeedCache;
use crate::config::{Config, RetryConfig};
use crate::credentials::{self, SecretStore, TomlSecretStore};
use crate::dev_mode::{self, FixtureSource};
use crate::history::{BOOTSTRAP_ENTRIES, Session};
use crate::ingest::waqi::{FeedSource, WaqiClient};
use crate::logging::{self, Component};
use crate::model::{AqiError, Credential, HistoryEntry, Location, RawPayload, Snapshot};
use crate::normalize;

/// Environment lookup used for credential resolution.
pub type EnvLookup = fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// ---------------------------------------------------------------------------
// Result of a refresh
// ---------------------------------------------------------------------------

/// Everything the presentation layer needs for one location.
#[derive(Debug, Clone)]
pub struct LocationReading {
    /// The location as configured (label included).
    pub location: Location,
    pub snapshot: Snapshot,
    /// `None` when the station reported no index.
    pub band: Option<&'static SeverityBand>,
    /// Session history inside the configured window, oldest first.
    pub history: Vec<HistoryEntry>,
    /// At least `BOOTSTRAP_ENTRIES` readings fall inside the window.
    pub bootstrapped: bool,
    pub stale: bool,
    pub age_minutes: u64,
    pub refreshed_at: DateTime<Utc>,
    pub window: Duration,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct Monitor {
    config: Config,
    source: Box<dyn FeedSource>,
    secrets: Box<dyn SecretStore>,
    env: EnvLookup,
    cache: FeedCache,
    credential: Option<Credential>,
}

impl Monitor {
    /// Fails with `Configuration` when the cache TTL does not fit a
    /// duration, which only happens for configs that skipped validation.
    pub fn new(
        config: Config,
        source: Box<dyn FeedSource>,
        secrets: Box<dyn SecretStore>,
    ) -> Result<Self, AqiError> {
        let cache = FeedCache::new(config.cache.ttl()?);
        Ok(Monitor {
            config,
            source,
            secrets,
            env: process_env,
            cache,
            credential: None,
        })
    }

    /// Builds a monitor for the live API, or for saved fixtures when
    /// `AQMON_FIXTURE_DIR` is set.
    pub fn from_config(config: Config) -> Result<Self, AqiError> {
        let source: Box<dyn FeedSource> = match dev_mode::fixture_dir_from_env() {
            Some(dir) => {
                logging::info(
                    Component::System,
                    None,
                    &format!("dev mode: replaying fixtures from {}", dir.display()),
                );
                Box::new(FixtureSource::new(dir))
            }
            None => Box::new(WaqiClient::new(
                &config.source.api_root,
                StdDuration::from_secs(config.source.timeout_secs),
            )?),
        };
        let secrets = Box::new(TomlSecretStore::new(config.credentials.secrets_file.clone()));
        Monitor::new(config, source, secrets)
    }

    /// Replaces the environment lookup used for credential resolution.
    pub fn with_env_lookup(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    /// The feed source, for one-off fetches that bypass the cache.
    pub fn source(&self) -> &dyn FeedSource {
        self.source.as_ref()
    }

    /// The API token, resolved on first use and kept for the life of the
    /// monitor. Sources that need no token get an empty one.
    pub fn credential(&mut self) -> Result<Credential, AqiError> {
        if let Some(cred) = &self.credential {
            return Ok(cred.clone());
        }
        let cred = if self.source.requires_credential() {
            credentials::resolve_with(self.env, self.secrets.as_ref())?
        } else {
            Credential::new("")
        };
        self.credential = Some(cred.clone());
        Ok(cred)
    }

    /// Runs one render cycle for `location` against the real clock.
    pub fn refresh(
        &mut self,
        session: &mut Session,
        location: &Location,
    ) -> Result<LocationReading, AqiError> {
        self.refresh_at(session, location, Utc::now())
    }

    /// Runs one render cycle for `location` as of `now`.
    pub fn refresh_at(
        &mut self,
        session: &mut Session,
        location: &Location,
        now: DateTime<Utc>,
    ) -> Result<LocationReading, AqiError> {
        let window = self.config.history.window()?;
        let credential = self.credential()?;
        let source = self.source.as_ref();
        let retry = &self.config.retry;
        let raw = self.cache.get_or_fetch_at(&location.id, now, || {
            fetch_with_retry(source, retry, &location.id, &credential)
        })?;

        // Only payloads that normalize stay memoized.
        let snapshot = match normalize::normalize(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.cache.invalidate(&location.id);
                return Err(e);
            }
        };
        if session.record(&snapshot) {
            logging::debug(
                Component::Session,
                Some(&location.id),
                &format!("recorded AQI {} at {}", snapshot.overall_index(), snapshot.observed_at()),
            );
        }

        let history: Vec<HistoryEntry> = session
            .ledger(&location.id)
            .map(|ledger| ledger.windowed_at(window, now).into_iter().cloned().collect())
            .unwrap_or_default();
        let bootstrapped = history.len() >= BOOTSTRAP_ENTRIES;

        let age_minutes = stalenesses::age_minutes_at(&snapshot, now);
        let stale =
            stalenesses::is_stale_at(&snapshot, self.config.history.stale_after_minutes, now);
        if stale {
            logging::warn(
                Component::Waqi,
                Some(&location.id),
                &format!("latest reading is {} minutes old", age_minutes),
            );
        }

        Ok(LocationReading {
            location: location.clone(),
            band: severity::classify_value(snapshot.overall_index()),
            snapshot,
            history,
            bootstrapped,
            stale,
            age_minutes,
            refreshed_at: now,
            window,
        })
    }

    /// Refreshes every configured location. Failures are logged and
    /// returned alongside successes; one failing location does not stop the
    /// others.
    pub fn refresh_all_at(
        &mut self,
        session: &mut Session,
        now: DateTime<Utc>,
    ) -> Vec<(Location, Result<LocationReading, AqiError>)> {
        let locations = self.config.monitored_locations();
        let mut results = Vec::with_capacity(locations.len());
        for location in locations {
            let result = self.refresh_at(session, &location, now);
            if let Err(e) = &result {
                logging::log_location_failure(&location.id, "refresh", e);
            }
            results.push((location, result));
        }

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        logging::log_refresh_summary(results.len(), results.len() - failed, failed);
        results
    }

    pub fn refresh_all(
        &mut self,
        session: &mut Session,
    ) -> Vec<(Location, Result<LocationReading, AqiError>)> {
        self.refresh_all_at(session, Utc::now())
    }
}

/// Fetches through `source`, retrying transport failures with exponential
/// backoff. Rejections and malformed payloads are returned immediately.
pub fn fetch_with_retry(
    source: &dyn FeedSource,
    retry: &RetryConfig,
    location_id: &str,
    credential: &Credential,
) -> Result<RawPayload, AqiError> {
    let mut backoff_ms = retry.initial_backoff_ms;
    let mut attempt = 1;
    loop {
        match source.fetch_raw(location_id, credential) {
            Ok(raw) => return Ok(raw),
            Err(e) if e.is_retryable() && attempt < retry.max_attempts => {
                logging::warn(
                    Component::Waqi,
                    Some(location_id),
                    &format!(
                        "attempt {}/{} failed, retrying in {} ms: {}",
                        attempt, retry.max_attempts, backoff_ms, e
                    ),
                );
                thread::sleep(StdDuration::from_millis(backoff_ms));
                backoff_ms = backoff_ms.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
