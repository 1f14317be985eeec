//! Ledger behaviour under concurrency and batch commits

use rollcall_collator::ingest::{commit_batch, Detection};
use rollcall_collator::ledger::{CheckIn, PresenceLedger};
use std::sync::Arc;
use tokio::task::JoinSet;

fn detection(label: &str) -> Detection {
    Detection {
        label: label.to_string(),
        bbox: vec![0.0, 0.0, 10.0, 10.0],
        score: 0.8,
    }
}

fn roster(names: &[String]) -> Vec<u8> {
    let details: Vec<_> = names
        .iter()
        .map(|name| serde_json::json!({"name": name, "images": [format!("{}.png", name)]}))
        .collect();
    serde_json::json!({ "details": details }).to_string().into_bytes()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_check_ins() {
    let ledger = Arc::new(PresenceLedger::new());
    let names: Vec<String> = (0..100).map(|i| format!("person-{:03}", i)).collect();
    ledger.load_roster(&roster(&names)).await.unwrap();

    let mut tasks = JoinSet::new();
    for name in names.clone() {
        let ledger = Arc::clone(&ledger);
        tasks.spawn(async move { ledger.check_in(&name).await });
    }
    while let Some(result) = tasks.join_next().await {
        assert_eq!(result.unwrap(), CheckIn::FirstSeen);
    }

    let count = ledger.count().await;
    assert_eq!(count.total, 100);
    assert_eq!(count.detected, 100);
    assert_eq!(count.attended, 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batch_commits() {
    let ledger = Arc::new(PresenceLedger::new());
    let names: Vec<String> = (0..20).map(|i| format!("p{}", i)).collect();
    ledger.load_roster(&roster(&names)).await.unwrap();

    let batch: Vec<Detection> = names.iter().map(|n| detection(n)).collect();
    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let ledger = Arc::clone(&ledger);
        let batch = batch.clone();
        tasks.spawn(async move { commit_batch(&ledger, &batch).await });
    }
    while let Some(result) = tasks.join_next().await {
        assert_eq!(result.unwrap(), 20);
    }

    let count = ledger.count().await;
    assert_eq!(count.detected, 20);
    assert_eq!(count.attended, 20);
}

#[tokio::test]
async fn test_roster_counts() {
    let ledger = PresenceLedger::new();
    let names: Vec<String> = ["ann", "ben", "cat", "dan", "eve"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    assert_eq!(ledger.load_roster(&roster(&names)).await.unwrap(), 5);

    let count = ledger.count().await;
    assert_eq!((count.total, count.detected, count.attended), (5, 0, 0));
    assert_eq!(ledger.get("eve").await.unwrap().reference_id, "eve");
}

#[tokio::test]
async fn test_detection_toggle_recommit_scenario() {
    let ledger = PresenceLedger::new();
    ledger
        .load_roster(br#"{"details":[{"name":"alice","images":["ref1.png"]}]}"#)
        .await
        .unwrap();

    let alice = ledger.get("alice").await.unwrap();
    assert_eq!(alice.reference_id, "ref1");
    assert!(!alice.attendance);
    assert!(!alice.detected);

    let batch = vec![detection("alice"), detection("stranger")];
    assert_eq!(commit_batch(&ledger, &batch).await, 1);

    let first = ledger.get("alice").await.unwrap();
    assert!(first.detected);
    assert!(first.attendance);
    assert!(first.first_seen.is_some());

    assert_eq!(ledger.toggle("alice").await, Some(false));

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    commit_batch(&ledger, &batch).await;

    let second = ledger.get("alice").await.unwrap();
    assert!(!second.attendance);
    assert_eq!(second.first_seen, first.first_seen);
    assert!(second.last_seen > first.last_seen);
    assert!(ledger.get("stranger").await.is_none());
}

#[tokio::test]
async fn test_unknown_check_in_changes_nothing() {
    let ledger = PresenceLedger::new();
    ledger
        .load_roster(br#"{"details":[{"name":"alice","images":[]}]}"#)
        .await
        .unwrap();
    let before = ledger.count().await;

    assert_eq!(ledger.check_in("bob").await, CheckIn::Unknown);
    assert_eq!(ledger.toggle("bob").await, None);

    assert_eq!(ledger.count().await, before);
    assert_eq!(ledger.len().await, 1);
}
