//! Shared test helpers: a local NDJSON detection source and polling utilities

#![allow(dead_code)]

use axum::{body::Body, routing::get, Router};
use rollcall_collator::ledger::{AttendanceCount, Record};
use rollcall_collator::Collator;
use rollcall_common::config::{StreamConfig, TomlConfig};
use rollcall_common::events::EventBus;
use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;

/// What the source does after emitting its lines
#[derive(Debug, Clone, Copy)]
pub enum Tail {
    /// Keep the response open without sending anything else
    Hold,
    /// Close the response body
    Close,
}

/// Serve `lines` as newline-delimited JSON on `/frResults`; returns the URL
///
/// Every request (including the start-time probe) gets its own copy of the lines.
pub async fn spawn_source(lines: Vec<String>, tail: Tail) -> String {
    let app = Router::new().route(
        "/frResults",
        get(move || {
            let lines = lines.clone();
            async move {
                let stream = async_stream::stream! {
                    for line in lines {
                        yield Ok::<_, Infallible>(format!("{}\n", line));
                    }
                    if let Tail::Hold = tail {
                        futures::future::pending::<()>().await;
                    }
                };
                Body::from_stream(stream)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/frResults", addr)
}

/// URL on a port nothing is listening on
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/frResults", addr)
}

/// Detection batch line naming `labels`
pub fn batch_line(labels: &[&str]) -> String {
    let data: Vec<_> = labels
        .iter()
        .map(|label| serde_json::json!({"label": label, "bbox": [0, 0, 1, 1], "score": 0.9}))
        .collect();
    serde_json::json!({ "data": data }).to_string()
}

pub fn test_config(snapshot_dir: &Path) -> TomlConfig {
    TomlConfig {
        snapshot_path: snapshot_dir.join("output.json"),
        stream: StreamConfig {
            probe_timeout_ms: 2000,
            read_idle_timeout_ms: 0,
        },
        ..TomlConfig::default()
    }
}

pub fn test_collator(config: &TomlConfig) -> Collator {
    Collator::new(config, EventBus::new(64)).expect("collator")
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const POLL_ATTEMPTS: usize = 300;

/// Poll until the record for `id` satisfies `predicate`; returns it
pub async fn wait_for_record(
    collator: &Collator,
    id: &str,
    predicate: impl Fn(&Record) -> bool,
) -> Record {
    for _ in 0..POLL_ATTEMPTS {
        if let Some(record) = collator.ledger().get(id).await {
            if predicate(&record) {
                return record;
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("record {:?} never reached expected state", id);
}

/// Poll until the aggregate count satisfies `predicate`
pub async fn wait_for_count(
    collator: &Collator,
    predicate: impl Fn(&AttendanceCount) -> bool,
) -> AttendanceCount {
    for _ in 0..POLL_ATTEMPTS {
        let count = collator.count().await;
        if predicate(&count) {
            return count;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("count never reached expected state");
}

/// Poll until exactly `expected` streams are registered
pub async fn wait_for_streams(collator: &Collator, expected: usize) {
    for _ in 0..POLL_ATTEMPTS {
        if collator.streams().await.len() == expected {
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    panic!("expected {} active streams", expected);
}
