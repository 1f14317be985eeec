//! Collator control surface
//!
//! Ties the shared [`PresenceLedger`] and [`StreamRegistry`] together: start
//! requests are probed, deduplicated and turned into supervised
//! [`StreamIngestor`] tasks; ledger operations are passed straight through.

use crate::error::{CollatorError, Result};
use crate::ingest::{probe_source, ReaderExit, StreamIngestor};
use crate::ledger::{write_snapshot, AttendanceCount, CheckIn, PresenceLedger, SnapshotLoad};
use crate::registry::{StartOutcome, StreamDescriptor, StreamRegistry};
use rollcall_common::config::{StreamConfig, TomlConfig};
use rollcall_common::events::{AttendanceEvent, EventBus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const USER_AGENT: &str = concat!("rollcall-collator/", env!("CARGO_PKG_VERSION"));

/// Shared handle to the ledger, the stream registry and the HTTP client
///
/// Cloning is cheap; all clones operate on the same ledger and registry.
#[derive(Debug, Clone)]
pub struct Collator {
    ledger: Arc<PresenceLedger>,
    registry: Arc<StreamRegistry>,
    client: reqwest::Client,
    events: EventBus,
    stream_config: StreamConfig,
    snapshot_path: PathBuf,
}

impl Collator {
    pub fn new(config: &TomlConfig, events: EventBus) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.stream.probe_timeout())
            .build()
            .map_err(|e| CollatorError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            ledger: Arc::new(PresenceLedger::with_events(events.clone())),
            registry: Arc::new(StreamRegistry::new()),
            client,
            events,
            stream_config: config.stream.clone(),
            snapshot_path: config.snapshot_path.clone(),
        })
    }

    pub fn ledger(&self) -> &Arc<PresenceLedger> {
        &self.ledger
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Start ingesting `url`, committing every `interval_ms` milliseconds
    ///
    /// A URL that is already streaming returns [`StartOutcome::AlreadyRunning`]
    /// without probing. Otherwise the source is probed first; an unreachable
    /// source registers nothing.
    pub async fn start_stream(&self, url: &str, interval_ms: u64) -> Result<StartOutcome> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CollatorError::InvalidInput("stream URL is empty".to_string()));
        }
        if interval_ms == 0 {
            return Err(CollatorError::InvalidInput(
                "update interval must be greater than zero".to_string(),
            ));
        }

        if self.registry.contains(url).await {
            return Ok(StartOutcome::AlreadyRunning);
        }

        probe_source(&self.client, url, self.stream_config.probe_timeout()).await?;

        let interval = rollcall_common::time::millis_to_duration(interval_ms);
        let outcome = self.registry.start(url, interval).await;

        if let StartOutcome::Started(handle) = &outcome {
            let ingestor = StreamIngestor::new(
                url,
                interval,
                self.ledger.clone(),
                handle.cancel.clone(),
                self.client.clone(),
            )
            .with_read_idle_timeout(self.stream_config.read_idle_timeout());

            self.events.emit_lossy(AttendanceEvent::StreamStarted {
                stream_id: handle.id,
                url: url.to_string(),
                update_interval_ms: interval_ms,
                timestamp: rollcall_common::time::now(),
            });

            let registry = self.registry.clone();
            let events = self.events.clone();
            let stream_id = handle.id;
            let url = url.to_string();
            tokio::spawn(async move {
                let exit = ingestor.run().await;

                // Explicit stops already removed the descriptor; only self-terminated
                // streams are still registered here.
                if registry.release(stream_id).await {
                    info!(url = %url, stream_id = %stream_id, exit = ?exit, "Stream removed after reader exit");
                    events.emit_lossy(AttendanceEvent::StreamEnded {
                        stream_id,
                        url,
                        timestamp: rollcall_common::time::now(),
                    });
                } else if exit != ReaderExit::Cancelled {
                    warn!(url = %url, exit = ?exit, "Reader exited after stream was stopped");
                }
            });
        }

        Ok(outcome)
    }

    /// Stop the stream for `url`; returns false if none was running
    pub async fn stop_stream(&self, url: &str) -> bool {
        let stopped = self.registry.stop(url).await;
        if stopped {
            self.events.emit_lossy(AttendanceEvent::StreamStopped {
                url: url.to_string(),
                timestamp: rollcall_common::time::now(),
            });
        }
        stopped
    }

    /// Point-in-time copy of the active streams
    pub async fn streams(&self) -> Vec<StreamDescriptor> {
        self.registry.list().await
    }

    /// Stop every stream
    pub async fn shutdown(&self) -> usize {
        let stopped = self.registry.shutdown().await;
        if stopped > 0 {
            info!("Stopped {} active stream(s)", stopped);
        }
        stopped
    }

    pub async fn check_in(&self, id: &str) -> CheckIn {
        self.ledger.check_in(id).await
    }

    pub async fn toggle(&self, id: &str) -> Option<bool> {
        self.ledger.toggle(id).await
    }

    pub async fn count(&self) -> AttendanceCount {
        self.ledger.count().await
    }

    pub async fn load_roster(&self, document: &[u8]) -> Result<usize> {
        self.ledger.load_roster(document).await
    }

    /// Snapshot document bytes
    pub async fn export_snapshot(&self) -> Result<Vec<u8>> {
        self.ledger.export().await
    }

    /// Write already-exported snapshot bytes to the configured snapshot file
    pub async fn persist_snapshot(&self, bytes: &[u8]) -> Result<()> {
        write_snapshot(&self.snapshot_path, bytes).await
    }

    /// Save the ledger to the configured snapshot file
    pub async fn save_snapshot(&self) -> Result<()> {
        self.ledger.snapshot_save(&self.snapshot_path).await
    }

    /// Best-effort merge of the configured snapshot file into the ledger
    pub async fn load_snapshot(&self) -> Result<SnapshotLoad> {
        self.ledger.snapshot_load(&self.snapshot_path).await
    }
}
