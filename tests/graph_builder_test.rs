//! GraphBuilder integration tests: idempotence, edge cardinality and log routing.

mod common;

use rootscout::domain::builder::{IngestOutcome, UNRESOLVED_SERVICE};
use rootscout::domain::event::EventStatus;
use rootscout::domain::node::Health;
use rootscout::domain::telemetry::SpanStatus;
use rootscout::error::IngestError;

use common::fixtures::{builder, failed_call, log, ok_call, span, store};

#[test]
fn test_redelivered_record_leaves_graph_unchanged() {
    let store = store(3, 50);
    let b = builder(&store);
    let record = ok_call("frontend", "checkout_service", "s1", 0);

    b.ingest(&record).unwrap();
    let (events, calls) = {
        let g = store.read();
        (
            g.get_node("checkout_service").unwrap().timeline().len(),
            g.edge("frontend", "checkout_service").unwrap().call_count,
        )
    };

    assert_eq!(b.ingest(&record).unwrap(), IngestOutcome::Duplicate);
    let g = store.read();
    assert_eq!(g.get_node("checkout_service").unwrap().timeline().len(), events);
    assert_eq!(g.edge("frontend", "checkout_service").unwrap().call_count, calls);
    assert_eq!(g.node_count(), 2);
    assert_eq!(b.stats().duplicates, 1);
}

#[test]
fn test_edge_count_equals_distinct_pairs() {
    let store = store(3, 50);
    let b = builder(&store);
    let pairs = [
        ("frontend", "checkout"),
        ("checkout", "payment"),
        ("frontend", "checkout"),
        ("checkout", "payment"),
        ("checkout", "inventory"),
        ("frontend", "checkout"),
    ];
    for (i, (caller, callee)) in pairs.iter().enumerate() {
        b.ingest(&ok_call(caller, callee, &format!("s{i}"), i as i64))
            .unwrap();
    }

    let g = store.read();
    assert_eq!(g.edge_count(), 3);
    assert_eq!(g.edge("frontend", "checkout").unwrap().call_count, 3);
    assert_eq!(g.edge("checkout", "payment").unwrap().call_count, 2);
}

#[test]
fn test_root_invocation_attaches_only_to_target() {
    let store = store(3, 50);
    let b = builder(&store);
    b.ingest(&span("frontend", None, "s1", SpanStatus::Ok, 0))
        .unwrap();

    let g = store.read();
    assert_eq!(g.node_count(), 1);
    assert_eq!(g.edge_count(), 0);
    assert_eq!(g.get_node("frontend").unwrap().health(), Health::Ok);
}

#[test]
fn test_self_call_is_not_an_edge() {
    let store = store(3, 50);
    let b = builder(&store);
    b.ingest(&ok_call("cart", "cart", "s1", 0)).unwrap();
    assert_eq!(store.read().edge_count(), 0);
}

#[test]
fn test_out_of_order_delivery_keeps_timeline_sorted() {
    let store = store(3, 50);
    let b = builder(&store);
    for (span_id, secs) in [("s3", 30), ("s1", 10), ("s2", 20)] {
        b.ingest(&ok_call("web", "api", span_id, secs)).unwrap();
    }
    let g = store.read();
    let stamps: Vec<_> = g
        .get_node("api")
        .unwrap()
        .timeline()
        .iter()
        .map(|e| e.timestamp)
        .collect();
    let mut sorted = stamps.clone();
    sorted.sort();
    assert_eq!(stamps, sorted);
}

#[test]
fn test_children_before_parents_yield_same_edges_as_in_order() {
    let trace = |service: &str, span_id: &str, parent: Option<&str>, secs: i64| {
        let mut record = span(service, None, span_id, SpanStatus::Ok, secs);
        record.parent_span_id = parent.map(String::from);
        record
    };
    let records = [
        trace("frontend", "s1", None, 0),
        trace("checkout", "s2", Some("s1"), 1),
        trace("payment", "s3", Some("s2"), 2),
    ];

    let in_order = store(3, 50);
    builder(&in_order).ingest_batch(&records);

    let reversed = store(3, 50);
    let b = builder(&reversed);
    for record in records.iter().rev() {
        b.ingest(record).unwrap();
    }
    for record in &records {
        assert_eq!(b.ingest(record).unwrap(), IngestOutcome::Duplicate);
    }

    for g in [in_order.read(), reversed.read()] {
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.edge("frontend", "checkout").map(|e| e.call_count), Some(1));
        assert_eq!(g.edge("checkout", "payment").map(|e| e.call_count), Some(1));
    }
}

#[test]
fn test_log_follows_its_span() {
    let store = store(3, 50);
    let b = builder(&store);
    b.ingest(&ok_call("frontend", "payment", "s1", 0)).unwrap();
    let outcome = b
        .ingest(&log("payment", "s1", "ERROR", "card declined", 1))
        .unwrap();
    assert_eq!(
        outcome,
        IngestOutcome::Recorded {
            service: "payment".into(),
            caller: None
        }
    );

    let g = store.read();
    let node = g.get_node("payment").unwrap();
    let logged = node.timeline().iter().find(|e| e.kind_str() == "log").unwrap();
    assert_eq!(logged.status, EventStatus::Error);
    assert_eq!(logged.payload.as_deref(), Some("payment: card declined"));
    // Error logs alone never push a node to error.
    assert_eq!(node.health(), Health::Ok);
}

#[test]
fn test_unmatched_log_goes_to_unresolved_bucket() {
    let store = store(3, 50);
    let b = builder(&store);
    b.ingest(&log("payment", "missing-span", "WARN", "retrying", 0))
        .unwrap();

    let g = store.read();
    assert!(g.get_node("payment").is_err());
    let bucket = g.get_node(UNRESOLVED_SERVICE).unwrap();
    assert_eq!(bucket.timeline().len(), 1);
    assert_eq!(bucket.health(), Health::Warn);
}

#[test]
fn test_malformed_records_never_reach_store() {
    let store = store(3, 50);
    let b = builder(&store);

    let mut no_service = ok_call("frontend", "checkout", "s1", 0);
    no_service.service_name = "   ".into();
    assert!(matches!(
        b.ingest(&no_service),
        Err(IngestError::MissingService { .. })
    ));

    let no_span = ok_call("frontend", "checkout", "", 0);
    assert!(matches!(
        b.ingest(&no_span),
        Err(IngestError::MissingSpanId { .. })
    ));

    assert_eq!(store.read().node_count(), 0);
    assert_eq!(b.stats().rejected, 2);
}

#[test]
fn test_batch_reports_per_batch_counts() {
    let store = store(1, 50);
    let b = builder(&store);
    let records = vec![
        ok_call("frontend", "checkout", "s1", 0),
        failed_call("checkout", "payment", "s2", 1),
        failed_call("checkout", "payment", "s2", 1),
        ok_call("frontend", "", "s3", 2),
    ];
    let stats = b.ingest_batch(&records);
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(store.read().get_node("payment").unwrap().health(), Health::Error);
}
