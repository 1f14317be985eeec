//! Detection stream ingestion
//!
//! One [`StreamIngestor`] runs per active stream and owns two tasks:
//!
//! - **reader**: holds a long-lived GET against the source and decodes its
//!   body as newline-delimited JSON batches, overwriting the latest-batch slot
//!   with each decoded line;
//! - **committer**: on a fixed timer, copies the slot and calls
//!   [`PresenceLedger::check_in`] for every detected label.
//!
//! The slot is last-write-wins, not a queue: the committer only ever wants
//! the most recent view, and re-applying it on idle ticks just advances
//! `last_seen`. Both tasks watch the stream's [`CancellationToken`]. When the
//! reader ends on its own (source closed, read error, idle timeout) the
//! ingestor cancels the token itself so the committer stops too.

use crate::error::{CollatorError, Result};
use crate::ledger::{CheckIn, PresenceLedger};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One detection reported by the recognition service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// `[x, y, w, h]`; carried but unused
    #[serde(default)]
    pub bbox: Vec<f32>,
    #[serde(default)]
    pub score: f32,
}

/// One NDJSON line of the detection stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    #[serde(default)]
    pub data: Vec<Detection>,
}

/// Decode one stream line. Blank lines yield `Ok(None)`.
pub fn decode_line(line: &[u8]) -> Result<Option<Vec<Detection>>> {
    let trimmed = trim_whitespace(line);
    if trimmed.is_empty() {
        return Ok(None);
    }

    serde_json::from_slice::<DetectionBatch>(trimmed)
        .map(|batch| Some(batch.data))
        .map_err(CollatorError::Decode)
}

fn trim_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// Longest detection line kept by default (1 MiB)
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits an arbitrarily chunked byte stream into `\n`-terminated lines
///
/// Lines longer than `max_line` bytes are dropped with a warning; reading
/// resumes at the next newline.
#[derive(Debug)]
pub struct LineDecoder {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to contain no newline
    scanned: usize,
    max_line: usize,
    /// Inside an oversized line whose head was already dropped
    discarding: bool,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineDecoder {
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_line,
            discarding: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line without its terminator
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') else {
                self.scanned = self.buf.len();
                if self.buf.len() > self.max_line {
                    warn!(limit = self.max_line, "Discarding oversized detection line");
                    self.buf.clear();
                    self.scanned = 0;
                    self.discarding = true;
                }
                return None;
            };

            let newline = self.scanned + offset;
            let mut line: Vec<u8> = self.buf.drain(..=newline).collect();
            self.scanned = 0;
            line.pop();

            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if line.len() > self.max_line {
                warn!(limit = self.max_line, len = line.len(), "Discarding oversized detection line");
                continue;
            }
            return Some(line);
        }
    }

    /// Unterminated remainder at end of stream
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            self.buf.clear();
            return None;
        }
        if self.buf.is_empty() || self.buf.len() > self.max_line {
            self.buf.clear();
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

/// Latest-batch mailbox shared by the reader and committer
#[derive(Debug, Clone, Default)]
pub struct BatchSlot {
    latest: Arc<Mutex<Vec<Detection>>>,
}

impl BatchSlot {
    /// Replace whatever batch is stored
    pub async fn replace(&self, batch: Vec<Detection>) {
        *self.latest.lock().await = batch;
    }

    /// Copy of the stored batch; the slot keeps its contents
    pub async fn current(&self) -> Vec<Detection> {
        self.latest.lock().await.clone()
    }
}

/// Check in every label in `batch`; returns how many matched a known entity
pub async fn commit_batch(ledger: &PresenceLedger, batch: &[Detection]) -> usize {
    let mut known = 0;
    for detection in batch {
        if ledger.check_in(&detection.label).await != CheckIn::Unknown {
            known += 1;
        }
    }
    known
}

/// Start-time connectivity probe
///
/// Fails on transport errors, on a non-success status, or when no response
/// headers arrive within `timeout`. The response body is dropped unread.
pub async fn probe_source(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<()> {
    let unreachable = |reason: String| CollatorError::SourceUnreachable {
        url: url.to_string(),
        reason,
    };

    let response = tokio::time::timeout(timeout, client.get(url).send())
        .await
        .map_err(|_| unreachable(format!("no response within {:?}", timeout)))?
        .map_err(|e| unreachable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(unreachable(format!("status {}", status)));
    }

    debug!(url = %url, "Source probe succeeded");
    Ok(())
}

/// Why a stream's reader stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// Cancellation token fired
    Cancelled,
    /// Source closed the response body
    EndOfStream,
    /// No bytes within the configured idle timeout
    IdleTimeout,
    /// Request or body read failed
    Failed(String),
}

/// Reader + committer pair for one detection stream
pub struct StreamIngestor {
    url: String,
    update_interval: Duration,
    ledger: Arc<PresenceLedger>,
    cancel: CancellationToken,
    client: reqwest::Client,
    read_idle_timeout: Option<Duration>,
    slot: BatchSlot,
}

impl StreamIngestor {
    pub fn new(
        url: impl Into<String>,
        update_interval: Duration,
        ledger: Arc<PresenceLedger>,
        cancel: CancellationToken,
        client: reqwest::Client,
    ) -> Self {
        Self {
            url: url.into(),
            update_interval,
            ledger,
            cancel,
            client,
            read_idle_timeout: None,
            slot: BatchSlot::default(),
        }
    }

    /// End the reader when the source goes quiet for `timeout` (None = wait forever)
    pub fn with_read_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_idle_timeout = timeout;
        self
    }

    /// Shared latest-batch slot
    pub fn slot(&self) -> BatchSlot {
        self.slot.clone()
    }

    /// Run until cancelled or until the reader ends
    ///
    /// Reader exit is treated as a stop: the token is cancelled before
    /// returning, so the committer is always finished when this returns.
    pub async fn run(self) -> ReaderExit {
        let committer = tokio::spawn(commit_loop(
            self.url.clone(),
            self.ledger.clone(),
            self.slot.clone(),
            self.update_interval,
            self.cancel.clone(),
        ));

        let exit = self.read_source().await;
        match &exit {
            ReaderExit::Cancelled => debug!(url = %self.url, "Ending stream reader"),
            ReaderExit::EndOfStream => info!(url = %self.url, "Stream ended"),
            ReaderExit::IdleTimeout => warn!(
                url = %self.url,
                timeout = ?self.read_idle_timeout,
                "Stream idle timeout, ending reader"
            ),
            ReaderExit::Failed(reason) => {
                warn!(url = %self.url, error = %reason, "Stream ended or error occurred")
            }
        }

        self.cancel.cancel();
        if let Err(e) = committer.await {
            warn!(url = %self.url, error = %e, "Committer task failed");
        }
        exit
    }

    async fn read_source(&self) -> ReaderExit {
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return ReaderExit::Cancelled,
            response = self.client.get(&self.url).send() => response,
        };
        let mut response = match response {
            Ok(response) => response,
            Err(e) => return ReaderExit::Failed(format!("request failed: {}", e)),
        };

        if !response.status().is_success() {
            warn!(url = %self.url, status = %response.status(), "Received non-OK status");
        }

        info!(
            url = %self.url,
            interval = ?self.update_interval,
            "Receiving results"
        );

        let mut decoder = LineDecoder::default();
        loop {
            let more = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return ReaderExit::Cancelled,
                more = self.fill(&mut response, &mut decoder) => more,
            };

            while let Some(line) = decoder.next_line() {
                self.apply_line(&line).await;
            }

            match more {
                Ok(true) => {}
                Ok(false) => {
                    if let Some(rest) = decoder.finish() {
                        self.apply_line(&rest).await;
                    }
                    return ReaderExit::EndOfStream;
                }
                Err(exit) => return exit,
            }
        }
    }

    /// Read the next body chunk into `decoder`; `Ok(false)` at end of body
    async fn fill(
        &self,
        response: &mut reqwest::Response,
        decoder: &mut LineDecoder,
    ) -> std::result::Result<bool, ReaderExit> {
        let chunk = match self.read_idle_timeout {
            Some(limit) => tokio::time::timeout(limit, response.chunk())
                .await
                .map_err(|_| ReaderExit::IdleTimeout)?,
            None => response.chunk().await,
        };

        match chunk {
            Ok(Some(bytes)) => {
                decoder.push(&bytes);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(ReaderExit::Failed(e.to_string())),
        }
    }

    async fn apply_line(&self, line: &[u8]) {
        match decode_line(line) {
            Ok(Some(batch)) => self.slot.replace(batch).await,
            Ok(None) => {}
            Err(e) => warn!(url = %self.url, error = %e, "Skipping malformed detection line"),
        }
    }
}

async fn commit_loop(
    url: String,
    ledger: Arc<PresenceLedger>,
    slot: BatchSlot,
    update_interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + update_interval, update_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(url = %url, "Ending committer");
                return;
            }
            _ = ticker.tick() => {
                let batch = slot.current().await;
                let known = commit_batch(&ledger, &batch).await;
                debug!(url = %url, detections = batch.len(), known, "Committed batch");
            }
        }
    }
}
