//! Change correlation: lookback window, per-node cap and packet inclusion.

mod common;

use chrono::TimeDelta;
use rootscout::domain::correlator::{CorrelationOutcome, CorrelationParams};
use rootscout::domain::isolator::FaultIsolator;
use rootscout::domain::node::Health;

use common::fixtures::{
    base_time, builder, correlator, failed_call, failed_root, ok_call, pull_request, push, store,
};

#[test]
fn test_change_outside_lookback_never_reaches_packet() {
    let store = store(1, 50);
    builder(&store)
        .ingest(&ok_call("frontend", "payment", "s1", 0))
        .unwrap();
    let c = correlator(&store, 24, 10);
    let now = base_time();

    let fresh = push("payment", "fresh01", now - TimeDelta::hours(2));
    let stale = push("payment", "stale01", now - TimeDelta::hours(25));
    assert_eq!(c.correlate(&fresh, now), CorrelationOutcome::Attached);
    assert_eq!(c.correlate(&stale, now), CorrelationOutcome::Stale);

    let packet = FaultIsolator::new(Default::default(), c.params().clone())
        .get_context(&store.read(), "frontend", now)
        .unwrap();
    let shas: Vec<_> = packet
        .correlated_changes
        .iter()
        .filter_map(|c| c.commit_sha.as_deref())
        .collect();
    assert_eq!(shas, vec!["fresh01"]);
}

#[test]
fn test_attached_change_ages_out_of_later_queries() {
    let store = store(1, 50);
    let c = correlator(&store, 24, 10);
    let now = base_time();
    c.correlate(&push("payment", "abc", now - TimeDelta::hours(20)), now);

    let later = now + TimeDelta::hours(5);
    let packet = FaultIsolator::new(Default::default(), c.params().clone())
        .get_context(&store.read(), "payment", later)
        .unwrap();
    assert!(packet.correlated_changes.is_empty());
}

#[test]
fn test_cap_bounds_ledger_and_timeline_change_events() {
    let store = store(1, 50);
    let c = correlator(&store, 168, 3);
    let now = base_time();
    for i in 0..5 {
        c.correlate(&push("search", &format!("c{i}"), now - TimeDelta::hours(10 - i)), now);
    }

    let g = store.read();
    let node = g.get_node("search").unwrap();
    let kept: Vec<_> = node
        .changes()
        .filter_map(|c| c.commit_sha.clone())
        .collect();
    assert_eq!(kept, vec!["c2", "c3", "c4"]);
    let timeline_changes: Vec<_> = node
        .timeline()
        .iter()
        .filter(|e| e.is_code_change())
        .map(|e| e.dedup_key.as_str())
        .collect();
    assert_eq!(
        timeline_changes,
        vec!["change:commit:c2", "change:commit:c3", "change:commit:c4"]
    );
}

#[test]
fn test_change_burst_does_not_crowd_errors_out_of_timeline() {
    let store = store(2, 6);
    let b = builder(&store);
    b.ingest(&failed_root("search", "e1", 0)).unwrap();
    b.ingest(&failed_root("search", "e2", 1)).unwrap();
    assert_eq!(store.read().get_node("search").unwrap().health(), Health::Error);

    let c = correlator(&store, 168, 2);
    let now = base_time() + TimeDelta::hours(1);
    for i in 0..10 {
        let ts = now - TimeDelta::minutes(10 - i);
        assert_eq!(
            c.correlate(&push("search", &format!("c{i}"), ts), now),
            CorrelationOutcome::Attached
        );
    }

    let g = store.read();
    let node = g.get_node("search").unwrap();
    assert_eq!(node.timeline().iter().filter(|e| e.is_code_change()).count(), 2);
    assert_eq!(node.timeline().len(), 4);
    assert_eq!(node.health(), Health::Error);
}

#[test]
fn test_pull_request_does_not_retag_version() {
    let store = store(1, 50);
    let c = correlator(&store, 168, 10);
    let now = base_time();
    c.correlate(&push("api", "v1sha", now - TimeDelta::hours(3)), now);
    c.correlate(&pull_request("api", 42, "prsha", now - TimeDelta::hours(1)), now);

    assert_eq!(store.read().get_node("api").unwrap().version(), Some("v1sha"));
}

#[test]
fn test_changes_sorted_newest_first_across_services() {
    let store = store(1, 50);
    let b = builder(&store);
    b.ingest(&ok_call("web", "api", "s1", 0)).unwrap();
    b.ingest(&failed_call("api", "db", "s2", 1)).unwrap();

    let now = base_time();
    let c = correlator(&store, 48, 10);
    c.correlate(&push("db", "db1", now - TimeDelta::hours(30)), now);
    c.correlate(&push("api", "api1", now - TimeDelta::hours(5)), now);
    c.correlate(&push("web", "web1", now - TimeDelta::hours(1)), now);

    let packet = FaultIsolator::new(
        Default::default(),
        CorrelationParams {
            lookback_hours: 48,
            max_events_per_node: 10,
        },
    )
    .get_context(&store.read(), "web", now)
    .unwrap();
    let order: Vec<_> = packet
        .correlated_changes
        .iter()
        .map(|c| c.service_id.as_str())
        .collect();
    assert_eq!(order, vec!["web", "api", "db"]);
    assert_eq!(packet.changes_for("db").count(), 1);
}
