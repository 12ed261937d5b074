use crate::app::dto::{AnalyzeResponse, StatusResponse};
use crate::app::engine::RootScoutEngine;
use crate::domain::isolator::ContextPacket;
use crate::domain::ports::RecordSource;
use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};

/// Replay recorded telemetry and changes into `engine`, then isolate `alert`.
///
/// The correlation window ends at the newest timestamp in the replayed data
/// so historical captures are judged against their own timeframe.
pub fn replay(
    engine: &RootScoutEngine,
    source: &dyn RecordSource,
    alert: &str,
    analyze: bool,
) -> Result<()> {
    let records = source.telemetry().context("Failed to load telemetry")?;
    let changes = source.changes().context("Failed to load change events")?;

    let now = records
        .iter()
        .map(|r| r.timestamp)
        .chain(changes.iter().map(|c| c.timestamp))
        .max()
        .unwrap_or_else(Utc::now);

    let ingested = engine.ingest_records(&records);
    let correlated = engine.ingest_changes_at(&changes, now);
    println!(
        "Replayed {} records ({} accepted, {} duplicate, {} expired, {} rejected)",
        records.len(),
        ingested.batch.accepted,
        ingested.batch.duplicates,
        ingested.batch.expired,
        ingested.batch.rejected
    );
    println!(
        "Replayed {} changes ({} attached, {} stale, {} duplicate)",
        changes.len(),
        correlated.batch.attached,
        correlated.batch.stale,
        correlated.batch.duplicates
    );
    println!();
    display_status(&engine.status());

    if analyze {
        let analysis = engine.analyze_at(alert, now)?;
        display_context(&analysis.context, now);
        display_analysis(&analysis);
    } else {
        let packet = engine.get_context_at(alert, now)?;
        display_context(&packet, now);
    }
    Ok(())
}

pub fn display_status(status: &StatusResponse) {
    println!(
        "Service graph: {} nodes, {} edges",
        status.node_count, status.edge_count
    );
    println!("{}", "=".repeat(60));
    for node in &status.nodes {
        println!(
            "  {:<24} {:<8} events={:<4} version={}",
            node.service,
            node.health.as_str(),
            node.event_count,
            node.version.as_deref().unwrap_or("-")
        );
        if !node.dependencies.is_empty() {
            println!("    -> {}", node.dependencies.join(", "));
        }
    }
}

pub fn display_context(packet: &ContextPacket, now: DateTime<Utc>) {
    println!("\nAlert on '{}' ({})", packet.target_service, packet.target_health.as_str());
    println!("{}", "=".repeat(60));
    println!("Verdict: {:?}", packet.verdict);
    for candidate in &packet.candidates {
        println!(
            "{}. {} [tier {}] {} hops, first error {}",
            candidate.rank,
            candidate.service,
            candidate.confidence_rank,
            candidate.hops,
            candidate
                .first_error_at
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_else(|| "-".to_string())
        );
        for event in candidate.recent_events.iter().rev().take(3) {
            println!(
                "     {} {:?} {}",
                event.kind_str(),
                event.status,
                event.payload.as_deref().unwrap_or("")
            );
        }
    }
    if !packet.upstream.is_empty() {
        println!("Upstream: {}", packet.upstream.join(", "));
    }
    if !packet.downstream.is_empty() {
        println!("Downstream: {}", packet.downstream.join(", "));
    }
    if !packet.correlated_changes.is_empty() {
        println!("\nRecent changes:");
        for change in &packet.correlated_changes {
            let age = now.signed_duration_since(change.timestamp);
            println!(
                "  {:<20} {} ({}h ago)",
                change.service_id,
                change.summary(),
                age.num_hours()
            );
        }
    }
}

pub fn display_analysis(analysis: &AnalyzeResponse) {
    let report = &analysis.report;
    println!("\nRoot cause: {} (confidence {:.2})", report.root_cause_service, report.confidence);
    println!("  {}", report.reasoning);
    println!("  Action: {}", report.recommended_action);
    if !report.suspect_changes.is_empty() {
        println!("  Suspect changes: {}", report.suspect_changes.join(", "));
    }
}
