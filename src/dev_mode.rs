//! Development mode: replay saved feed responses
//!
//! When the live WAQI API is unreachable or no token is at hand, point
//! `AQMON_FIXTURE_DIR` at a directory of saved responses and the service
//! reads `<dir>/<location id>.json` instead of calling the network. Fixtures
//! go through the same envelope validation as live responses, so a saved
//! `{"status":"error",...}` body reproduces a rejection.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::waqi::{self, FeedSource};
use crate::model::{AqiError, Credential, RawPayload};

/// Environment variable that switches the service to fixture replay.
pub const FIXTURE_DIR_ENV: &str = "AQMON_FIXTURE_DIR";

/// Fixture directory from the environment, if dev mode is enabled.
pub fn fixture_dir_from_env() -> Option<PathBuf> {
    std::env::var_os(FIXTURE_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Feed source reading saved JSON responses from a directory.
pub struct FixtureSource {
    dir: PathBuf,
}

impl FixtureSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FixtureSource { dir: dir.into() }
    }

    /// File holding the fixture for `location_id`. Route separators in
    /// station paths (`istanbul/besiktas`) become `_`.
    pub fn fixture_path(&self, location_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", location_id.replace('/', "_")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FeedSource for FixtureSource {
    fn fetch_raw(&self, location_id: &str, _credential: &Credential) -> Result<RawPayload, AqiError> {
        let path = self.fixture_path(location_id);
        let body = fs::read_to_string(&path).map_err(|e| AqiError::SourceUnavailable {
            status: None,
            cause: format!("no fixture at {}: {}", path.display(), e),
        })?;
        waqi::interpret_feed_response(location_id, 200, &body)
    }

    fn requires_credential(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).expect("write fixture");
    }

    #[test]
    fn test_fixture_is_served_as_payload() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_fixture(
            dir.path(),
            "antalya.json",
            r#"{"status":"ok","data":{"aqi":57,"time":{"v":1714564800},"city":{"geo":[36.9,30.7]}}}"#,
        );
        let source = FixtureSource::new(dir.path());
        let raw = source
            .fetch_raw("antalya", &Credential::new(""))
            .expect("fixture present");
        assert_eq!(raw.location_id, "antalya");
        assert_eq!(raw.body["data"]["aqi"], 57);
    }

    #[test]
    fn test_saved_rejection_is_replayed() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_fixture(dir.path(), "atlantis.json", r#"{"status":"error","data":"Unknown station"}"#);
        let source = FixtureSource::new(dir.path());
        let result = source.fetch_raw("atlantis", &Credential::new(""));
        assert_eq!(result, Err(AqiError::SourceRejected("Unknown station".into())));
    }

    #[test]
    fn test_missing_fixture_is_unavailable() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = FixtureSource::new(dir.path());
        let result = source.fetch_raw("izmir", &Credential::new(""));
        assert!(matches!(result, Err(AqiError::SourceUnavailable { status: None, .. })));
    }

    #[test]
    fn test_station_paths_map_to_flat_file_names() {
        let source = FixtureSource::new("/fixtures");
        assert_eq!(
            source.fixture_path("istanbul/besiktas"),
            PathBuf::from("/fixtures/istanbul_besiktas.json")
        );
        assert_eq!(source.fixture_path("@4018"), PathBuf::from("/fixtures/@4018.json"));
        assert!(!source.requires_credential());
    }
}
