use std::collections::HashSet;
use std::sync::Arc;

use marquee::application::contract::Contracts;
use marquee::application::keys::{INDEX_MARKER, IndexKey, RecordKey};
use marquee::application::ledger::{LedgerError, LedgerStub};
use marquee::infra::gateway::Gateway;
use marquee::infra::ledger::{EventQueue, MemoryLedger};
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn ledger_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // A one-slot queue forces the second event out.
    let ledger = MemoryLedger::in_memory(Arc::new(EventQueue::new_with_limit(1)));
    let gateway = Gateway::new(Arc::new(ledger), Contracts::default());

    // Invocations: committed, refused and failed.
    gateway
        .invoke("ratings", "SubmitRating", &args(&["r1", "e1", "films", "alice", "4"]))
        .expect("rating commits");
    gateway
        .invoke("ratings", "SubmitRating", &args(&["r2", "e1", "films", "bob", "5"]))
        .expect("rating commits");
    let refused = gateway
        .invoke(
            "content",
            "SubmitContentRequest",
            &args(&["bad", "Title", "", "", "[]", "", "alice", ""]),
        )
        .expect("refusal is not an error");
    assert!(!refused.committed);
    assert!(
        gateway
            .invoke("ratings", "SubmitRating", &args(&["r3", "e1", "films", "carol", "7"]))
            .is_err()
    );

    // Dangling index entry skipped during a scan.
    let dangling = IndexKey::EntryByRepo {
        repo: "films",
        entry_id: "ghost",
    }
    .encode()
    .expect("index key");
    let mut tx = gateway.ledger().begin();
    tx.put_state(&dangling, INDEX_MARKER.to_vec()).expect("stage index");
    tx.commit().expect("index commits");
    let listed = gateway
        .invoke("entries", "ListEntries", &args(&["films"]))
        .expect("list succeeds");
    assert_eq!(listed.result, serde_json::json!([]));

    // Undecodable record behind a valid index entry.
    gateway
        .invoke(
            "comments",
            "AddComment",
            &args(&["c1", "e1", "films", "hello", "bob", "4", ""]),
        )
        .expect("comment commits");
    let corrupt = RecordKey::Comment {
        comment_id: "c1",
        entry_id: "e1",
    }
    .encode()
    .expect("comment key");
    let mut tx = gateway.ledger().begin();
    tx.put_state(&corrupt, b"{not json".to_vec()).expect("stage corrupt record");
    tx.commit().expect("corrupt record commits");
    let comments = gateway
        .invoke("comments", "GetEntryComments", &args(&["e1"]))
        .expect("listing succeeds");
    assert_eq!(comments.result, serde_json::json!([]));

    // Two writers racing on one key.
    let key = RecordKey::Request("tt0000001").encode().expect("record key");
    let mut first = gateway.ledger().begin();
    let mut second = gateway.ledger().begin();
    assert!(first.get_state(&key).expect("read").is_none());
    assert!(second.get_state(&key).expect("read").is_none());
    first.put_state(&key, b"{}".to_vec()).expect("stage first");
    second.put_state(&key, b"{}".to_vec()).expect("stage second");
    first.commit().expect("first writer wins");
    assert!(matches!(second.commit(), Err(LedgerError::Conflict { .. })));

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let skipped_reasons: HashSet<String> = snapshot
        .iter()
        .filter(|(composite_key, _, _, value)| {
            composite_key.key().name() == "marquee_scan_skipped_total"
                && matches!(value, DebugValue::Counter(count) if *count > 0)
        })
        .flat_map(|(composite_key, _, _, _)| {
            composite_key
                .key()
                .labels()
                .filter(|label| label.key() == "reason")
                .map(|label| label.value().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    assert!(skipped_reasons.contains("dangling_index_entry"));
    assert!(skipped_reasons.contains("undecodable_record"));

    let expected = [
        "marquee_invocations_total",
        "marquee_commit_conflicts_total",
        "marquee_scan_skipped_total",
        "marquee_events_published_total",
        "marquee_events_dropped_total",
        "marquee_event_queue_len",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
