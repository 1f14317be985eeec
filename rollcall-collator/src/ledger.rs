//! Presence ledger
//!
//! Concurrent mapping from entity identifier to [`Record`]. A single mutex
//! guards the whole map: every read and write goes through it, so concurrent
//! `check_in`/`toggle`/`count` calls behave like some sequential interleaving.
//!
//! The ledger knows nothing about detection streams; ingestors simply call
//! [`PresenceLedger::check_in`] for each detected label.

use crate::error::{CollatorError, Result};
use crate::roster::RosterDocument;
use chrono::{DateTime, Utc};
use rollcall_common::events::{AttendanceEvent, EventBus};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Attendance state of one tracked entity
///
/// `first_seen` is `None` until the first detection and never changes after.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub attendance: bool,
    #[serde(default)]
    pub detected: bool,
    #[serde(rename = "firstSeen", default, deserialize_with = "zero_instant_as_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(rename = "lastSeen", default, deserialize_with = "zero_instant_as_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(rename = "referenceID", alias = "referenceid", default)]
    pub reference_id: String,
}

/// Seconds since the epoch of `0001-01-01T00:00:00Z`
const ZERO_INSTANT_SECS: i64 = -62_135_596_800;

/// Older snapshot files write "never" as `0001-01-01T00:00:00Z` instead of `null`
fn zero_instant_as_none<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let instant = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(instant.filter(|at| at.timestamp() > ZERO_INSTANT_SECS))
}

impl Record {
    /// Apply one detection at `now`; returns true on the first detection
    fn observe(&mut self, now: DateTime<Utc>) -> bool {
        self.detected = true;
        self.last_seen = Some(now);

        if self.first_seen.is_none() {
            self.first_seen = Some(now);
            self.attendance = true;
            return true;
        }
        false
    }
}

/// Result of a [`PresenceLedger::check_in`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckIn {
    /// Identifier is not on the roster; nothing changed
    Unknown,
    /// First detection: entity marked present
    FirstSeen,
    /// Already seen before; only `last_seen` moved
    Seen,
}

/// Aggregate counts over the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceCount {
    pub total: usize,
    pub detected: usize,
    pub attended: usize,
}

/// Outcome of a best-effort snapshot load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotLoad {
    /// No snapshot file; ledger untouched
    Missing,
    /// Number of records merged from the snapshot
    Loaded(usize),
}

/// Shared presence ledger
#[derive(Debug, Default)]
pub struct PresenceLedger {
    records: Mutex<HashMap<String, Record>>,
    events: Option<EventBus>,
}

impl PresenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that announces first detections, toggles and roster loads on `events`
    pub fn with_events(events: EventBus) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            events: Some(events),
        }
    }

    fn emit(&self, event: AttendanceEvent) {
        if let Some(events) = &self.events {
            events.emit_lossy(event);
        }
    }

    /// Insert a fresh record for `id`, replacing any existing one
    pub async fn add(&self, id: impl Into<String>) {
        self.records.lock().await.insert(id.into(), Record::default());
    }

    /// Record a detection of `id`
    ///
    /// Unknown identifiers are ignored. The first detection sets `first_seen`
    /// and marks the entity present; later detections only advance `last_seen`
    /// so a manual [`toggle`](Self::toggle) is not overridden by the stream.
    pub async fn check_in(&self, id: &str) -> CheckIn {
        let now = rollcall_common::time::now();

        let outcome = {
            let mut records = self.records.lock().await;
            match records.get_mut(id) {
                None => CheckIn::Unknown,
                Some(record) => {
                    if record.observe(now) {
                        CheckIn::FirstSeen
                    } else {
                        CheckIn::Seen
                    }
                }
            }
        };

        if outcome == CheckIn::FirstSeen {
            info!("{} present!", id);
            self.emit(AttendanceEvent::Present {
                id: id.to_string(),
                timestamp: now,
            });
        }
        outcome
    }

    /// Flip `attendance` for `id`; returns the new value, or `None` if unknown
    pub async fn toggle(&self, id: &str) -> Option<bool> {
        let attendance = {
            let mut records = self.records.lock().await;
            let record = records.get_mut(id)?;
            record.attendance = !record.attendance;
            record.attendance
        };

        debug!(id = %id, attendance, "Attendance toggled");
        self.emit(AttendanceEvent::AttendanceToggled {
            id: id.to_string(),
            attendance,
            timestamp: rollcall_common::time::now(),
        });
        Some(attendance)
    }

    pub async fn count(&self) -> AttendanceCount {
        let records = self.records.lock().await;
        records.values().fold(
            AttendanceCount {
                total: records.len(),
                ..AttendanceCount::default()
            },
            |mut count, record| {
                count.detected += usize::from(record.detected);
                count.attended += usize::from(record.attendance);
                count
            },
        )
    }

    /// Discard every record
    pub async fn clear(&self) {
        self.records.lock().await.clear();
    }

    pub async fn get(&self, id: &str) -> Option<Record> {
        self.records.lock().await.get(id).cloned()
    }

    /// Point-in-time copy of the whole mapping
    pub async fn records(&self) -> HashMap<String, Record> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Replace the ledger contents with the entries of a roster document
    ///
    /// The document is parsed before anything is touched, so a malformed
    /// roster leaves the ledger unchanged. The clear-and-rebuild happens under
    /// one lock acquisition. Returns the number of tracked entities.
    pub async fn load_roster(&self, document: &[u8]) -> Result<usize> {
        let roster = RosterDocument::parse(document)?;

        let total = {
            let mut records = self.records.lock().await;
            records.clear();
            for (name, reference_id) in roster.entries() {
                records.insert(
                    name.to_string(),
                    Record {
                        reference_id: reference_id.unwrap_or_default(),
                        ..Record::default()
                    },
                );
            }
            records.len()
        };

        info!("Loaded roster with {} entries", total);
        self.emit(AttendanceEvent::RosterLoaded {
            total,
            timestamp: rollcall_common::time::now(),
        });
        Ok(total)
    }

    /// Snapshot document (pretty JSON object keyed by identifier)
    pub async fn export(&self) -> Result<Vec<u8>> {
        let records = self.records.lock().await;
        Ok(serde_json::to_vec_pretty(&*records)?)
    }

    /// Write the snapshot document to `path`
    pub async fn snapshot_save(&self, path: &Path) -> Result<()> {
        let bytes = self.export().await?;
        write_snapshot(path, &bytes).await
    }

    /// Merge a previously saved snapshot into the ledger
    ///
    /// A missing file is logged and skipped. A corrupt file is logged and
    /// reported as [`CollatorError::SnapshotCorrupt`] without touching the ledger.
    pub async fn snapshot_load(&self, path: &Path) -> Result<SnapshotLoad> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Snapshot {} does not exist, starting empty", path.display());
                return Ok(SnapshotLoad::Missing);
            }
            Err(e) => {
                warn!("Error opening snapshot {}: {}", path.display(), e);
                return Err(e.into());
            }
        };

        let snapshot: HashMap<String, Record> = match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(source) => {
                let err = CollatorError::SnapshotCorrupt {
                    path: path.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                return Err(err);
            }
        };

        let loaded = snapshot.len();
        self.records.lock().await.extend(snapshot);

        info!("Loaded {} records from previous session", loaded);
        Ok(SnapshotLoad::Loaded(loaded))
    }
}

/// Write snapshot bytes via a sibling temp file, then rename into place
pub async fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!("Snapshot written to {}", path.display());
    Ok(())
}
