//! Drive one query through a coordinator and report the outcome.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout, Instant};

use saferoute_core::{rank_paths, Coordinate, RequestState, SessionSnapshot};
use saferoute_sdk::{Coordinator, Query, SessionEvent};

/// Re-check the batch at least this often; not every response emits an event.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Parse `lat,lng` in decimal degrees.
pub fn parse_point(value: &str) -> Result<Coordinate> {
    let (lat, lng) = value
        .split_once(',')
        .with_context(|| format!("expected lat,lng but got '{}'", value))?;
    let lat: f64 = lat.trim().parse().context("invalid latitude")?;
    let lng: f64 = lng.trim().parse().context("invalid longitude")?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        bail!("point {} is out of range", value);
    }
    Ok(Coordinate::new(lat, lng))
}

/// Submit `query` and wait until every request of its batch completed, or
/// until `wait` elapsed.
pub async fn run_query(
    coordinator: &Coordinator,
    query: Query,
    wait: Duration,
) -> Result<SessionSnapshot> {
    let mut events = coordinator.subscribe();
    let sent = coordinator.submit_query(query).await?;
    tracing::info!("Sent {} request(s)", sent);

    let deadline = Instant::now() + wait;
    loop {
        let snapshot = coordinator.snapshot().await?;
        if all_completed(&snapshot) {
            return Ok(snapshot);
        }
        if Instant::now() >= deadline {
            tracing::warn!("Gave up waiting after {:?}", wait);
            return Ok(snapshot);
        }
        match timeout(POLL_INTERVAL, events.recv()).await {
            Err(_) => {}
            Ok(Ok(SessionEvent::RequestFailed { message })) => {
                eprintln!("Request failed: {}", message);
            }
            Ok(Ok(event)) => tracing::debug!("{:?}", short(&event)),
            Ok(Err(RecvError::Lagged(skipped))) => {
                tracing::debug!("Skipped {} event(s)", skipped);
            }
            Ok(Err(RecvError::Closed)) => bail!("coordinator stopped"),
        }
    }
}

fn all_completed(snapshot: &SessionSnapshot) -> bool {
    !snapshot.sub_requests.is_empty()
        && snapshot
            .sub_requests
            .iter()
            .all(|s| s.state != RequestState::Sent)
}

fn short(event: &SessionEvent) -> String {
    match event {
        SessionEvent::PathsUpdated { paths, .. } => format!("{} path(s)", paths.len()),
        SessionEvent::SafetyUpdated { records } => format!("{} safety record(s)", records.len()),
        SessionEvent::RequestFailed { message } => format!("failure: {}", message),
        SessionEvent::Cleared => "cleared".to_string(),
    }
}

/// Human readable summary of a finished session.
pub fn print_report(snapshot: &SessionSnapshot) {
    let succeeded = snapshot
        .sub_requests
        .iter()
        .filter(|s| s.state == RequestState::Succeeded)
        .count();
    println!(
        "Requests: {} sent, {} succeeded, {} decoy(s)",
        snapshot.sub_requests.len(),
        succeeded,
        snapshot
            .sub_requests
            .iter()
            .filter(|s| s.uses_synthetic_midpoints)
            .count()
    );
    println!();

    let selected = snapshot.selected_path.as_ref().map(|p| p.id);
    println!(
        "  {:<3} {:>10} {:>9} {:>5} {:>7}",
        "", "km", "min", "rank", "safety"
    );
    for path in &snapshot.paths {
        let record = snapshot
            .safety_records
            .iter()
            .find(|r| r.path_id == path.id);
        println!(
            "  {:<3} {:>10.2} {:>9.1} {:>5} {:>7}",
            if Some(path.id) == selected { "*" } else { "" },
            path.distance / 1000.0,
            path.duration_ms as f64 / 60_000.0,
            record.map(|r| r.rank.to_string()).unwrap_or_else(|| "-".to_string()),
            record
                .map(|r| format!("{:.2}", r.overall_score))
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    let ranked = rank_paths(&snapshot.paths, &snapshot.safety_records);
    if !ranked.is_empty() {
        println!();
        println!("Blended order:");
        for (i, id) in ranked.iter().enumerate() {
            println!("  {}. {}", i + 1, id);
        }
    }
}
