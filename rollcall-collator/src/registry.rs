//! Stream registry
//!
//! Ordered set of active detection streams keyed by source URL. The registry
//! deduplicates start requests and owns one [`CancellationToken`] per stream;
//! stopping a stream removes its descriptor and cancels the token.
//!
//! The registry lock is independent of the ledger lock and is never held
//! while touching the ledger.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// One active detection stream
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub id: Uuid,
    pub url: String,
    pub update_interval: Duration,
    pub started_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl StreamDescriptor {
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Handle given to the caller that launches the stream's ingestor
#[derive(Debug, Clone)]
pub struct StreamHandle {
    pub id: Uuid,
    pub cancel: CancellationToken,
}

/// Result of [`StreamRegistry::start`]
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// A stream for this URL is already registered; nothing was created
    AlreadyRunning,
    /// New stream registered
    Started(StreamHandle),
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started(_))
    }
}

#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: Mutex<Vec<StreamDescriptor>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream for `url` unless one is already running
    pub async fn start(&self, url: &str, update_interval: Duration) -> StartOutcome {
        let mut streams = self.streams.lock().await;

        if streams.iter().any(|stream| stream.url == url) {
            debug!(url = %url, "Stream already running");
            return StartOutcome::AlreadyRunning;
        }

        let descriptor = StreamDescriptor {
            id: Uuid::new_v4(),
            url: url.to_string(),
            update_interval,
            started_at: rollcall_common::time::now(),
            cancel: CancellationToken::new(),
        };
        let handle = StreamHandle {
            id: descriptor.id,
            cancel: descriptor.cancel.clone(),
        };
        streams.push(descriptor);

        info!(url = %url, stream_id = %handle.id, "Stream registered");
        StartOutcome::Started(handle)
    }

    /// Remove the stream for `url` and signal its cancellation
    ///
    /// Returns false if no such stream was registered.
    pub async fn stop(&self, url: &str) -> bool {
        let removed = {
            let mut streams = self.streams.lock().await;
            streams
                .iter()
                .position(|stream| stream.url == url)
                .map(|index| streams.remove(index))
        };

        match removed {
            Some(stream) => {
                stream.cancel.cancel();
                info!(url = %url, stream_id = %stream.id, "Stream stopped");
                true
            }
            None => false,
        }
    }

    /// Remove the stream with this id, if it is still registered
    ///
    /// Used when an ingestor exits on its own. Matching on id rather than URL
    /// keeps a finished ingestor from removing a newer stream for the same URL.
    pub async fn release(&self, id: Uuid) -> bool {
        let removed = {
            let mut streams = self.streams.lock().await;
            streams
                .iter()
                .position(|stream| stream.id == id)
                .map(|index| streams.remove(index))
        };

        if let Some(stream) = &removed {
            stream.cancel.cancel();
            debug!(url = %stream.url, stream_id = %id, "Stream released");
        }
        removed.is_some()
    }

    /// Point-in-time copy of every registered stream, in start order
    pub async fn list(&self) -> Vec<StreamDescriptor> {
        self.streams.lock().await.clone()
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.streams.lock().await.iter().any(|stream| stream.url == url)
    }

    pub async fn len(&self) -> usize {
        self.streams.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.streams.lock().await.is_empty()
    }

    /// Stop every stream; returns how many were running
    pub async fn shutdown(&self) -> usize {
        let streams = std::mem::take(&mut *self.streams.lock().await);
        for stream in &streams {
            stream.cancel.cancel();
        }
        streams.len()
    }
}
