//! Session-scoped reading history.
//!
//! A `HistoryLedger` is an append-only list of `HistoryEntry` values for one
//! location. A `Session` owns one ledger per location and is passed into
//! every render cycle explicitly; there is no module-level state. Ledgers
//! live exactly as long as their session and are never persisted.
//!
//! # Deduplication
//! The only rule is against the most recent entry: a snapshot whose
//! `observed_at` equals the latest entry's is dropped, whatever its index.
//! The first write for a timestamp wins. Refreshes within the upstream
//! update interval therefore do not grow the ledger.
//!
//! # Clock injection
//! `windowed_at` takes `now` explicitly; `windowed` uses `Utc::now()`.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::logging::{self, Component};
use crate::model::{HistoryEntry, Snapshot};

/// Entries needed before a trend line means anything.
pub const BOOTSTRAP_ENTRIES: usize = 2;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Reading history for a single location within a session.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryLedger {
    location_id: String,
    entries: Vec<HistoryEntry>,
}

impl HistoryLedger {
    pub fn new(location_id: &str) -> Self {
        HistoryLedger {
            location_id: location_id.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }

    /// Records a snapshot. Returns `true` if an entry was appended, `false`
    /// if it was a duplicate of the latest entry or belongs to another
    /// location.
    pub fn append(&mut self, snapshot: &Snapshot) -> bool {
        if snapshot.location().id != self.location_id {
            logging::warn(
                Component::Session,
                Some(&self.location_id),
                &format!(
                    "refusing snapshot for '{}' in ledger for '{}'",
                    snapshot.location().id,
                    self.location_id
                ),
            );
            return false;
        }
        if let Some(latest) = self.entries.last() {
            if latest.observed_at == snapshot.observed_at() {
                return false;
            }
        }
        self.entries.push(HistoryEntry::from(snapshot));
        true
    }

    /// Entries with `observed_at >= now - since`, in append order. A window
    /// reaching past the representable range covers every entry.
    pub fn windowed_at(&self, since: Duration, now: DateTime<Utc>) -> Vec<&HistoryEntry> {
        let Some(cutoff) = now.checked_sub_signed(since) else {
            return self.entries.iter().collect();
        };
        self.entries
            .iter()
            .filter(|e| e.observed_at >= cutoff)
            .collect()
    }

    /// `windowed_at` against the real current time.
    pub fn windowed(&self, since: Duration) -> Vec<&HistoryEntry> {
        self.windowed_at(since, Utc::now())
    }

    /// True once enough entries exist for a trend to be meaningful.
    pub fn is_bootstrapped(&self) -> bool {
        self.entries.len() >= BOOTSTRAP_ENTRIES
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One user's interactive visit. Owns a ledger per location, created empty
/// on first use.
///
/// A host serving several users keeps one `Session` per user; nothing here
/// is shared between sessions.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    started_at: DateTime<Utc>,
    ledgers: HashMap<String, HistoryLedger>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Session::started_at(id, Utc::now())
    }

    pub fn started_at(id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Session {
            id: id.into(),
            started_at,
            ledgers: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The ledger for a location, if anything has been recorded for it.
    pub fn ledger(&self, location_id: &str) -> Option<&HistoryLedger> {
        self.ledgers.get(location_id)
    }

    /// The ledger for a location, initialized empty on first use.
    pub fn ledger_mut(&mut self, location_id: &str) -> &mut HistoryLedger {
        self.ledgers
            .entry(location_id.to_string())
            .or_insert_with(|| HistoryLedger::new(location_id))
    }

    /// Appends a snapshot to its location's ledger. Returns whether an entry
    /// was added.
    pub fn record(&mut self, snapshot: &Snapshot) -> bool {
        let appended = self.ledger_mut(&snapshot.location().id).append(snapshot);
        if !appended {
            logging::debug(
                Component::Session,
                Some(&snapshot.location().id),
                &format!(
                    "reading at {} already recorded in session {}",
                    snapshot.observed_at().format("%Y-%m-%d %H:%M UTC"),
                    self.id
                ),
            );
        }
        appended
    }

    /// Starts the session over: every ledger is dropped.
    pub fn reset(&mut self) {
        self.reset_at(Utc::now());
    }

    pub fn reset_at(&mut self, now: DateTime<Utc>) {
        self.ledgers.clear();
        self.started_at = now;
        logging::info(
            Component::Session,
            None,
            &format!("session {} reset", self.id),
        );
    }

    /// Location ids with a ledger in this session.
    pub fn tracked_locations(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ledgers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
