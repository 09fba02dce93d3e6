//! Response correlation for one routing session.
//!
//! A session lives from one query submission (or clear) to the next. It owns
//! the request batch, the merged path collection and the safety scores, and
//! is mutated only through the methods below, one event at a time.

use std::cmp::Ordering;
use std::fmt::Display;

use serde::Serialize;

use crate::error::SessionError;
use crate::models::{
    Path, PathBatch, PathId, PathSafetyRecord, PlannedRequest, RequestId, RequestState,
    RoutingResult, SubRequest,
};
use crate::reconstruct::restore;
use crate::rules::RoutingRules;
use crate::safety::SafetySynthesizer;
use crate::tracker::RequestTracker;

/// What a response did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The response belongs to a superseded batch and was dropped.
    Stale,
    /// New paths (possibly none) were merged. `records` holds every safety
    /// record this response released, including held-back ones.
    Merged {
        added: Vec<PathId>,
        records: Vec<PathSafetyRecord>,
    },
}

/// Point-in-time copy of everything downstream consumers render.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub paths: Vec<Path>,
    pub selected_path: Option<Path>,
    pub safety_records: Vec<PathSafetyRecord>,
    pub sub_requests: Vec<SubRequest>,
}

pub struct RoutingSession {
    tracker: RequestTracker,
    paths: Vec<Path>,
    selected: Option<PathId>,
    safety: SafetySynthesizer,
}

impl RoutingSession {
    pub fn new(rules: RoutingRules) -> Self {
        Self::with_synthesizer(SafetySynthesizer::new(rules))
    }

    pub fn with_seed(rules: RoutingRules, seed: u64) -> Self {
        Self::with_synthesizer(SafetySynthesizer::with_seed(rules, seed))
    }

    fn with_synthesizer(safety: SafetySynthesizer) -> Self {
        Self {
            tracker: RequestTracker::new(),
            paths: Vec::new(),
            selected: None,
            safety,
        }
    }

    /// Start a new session for a freshly built batch. Paths, scores and the
    /// previous batch are discarded.
    pub fn submit(&mut self, planned: Vec<PlannedRequest>) -> Vec<SubRequest> {
        self.reset_results();
        let batch = self.tracker.submit(planned).to_vec();
        tracing::debug!(
            "Tracking {} request(s), generation {}",
            batch.len(),
            self.tracker.generation()
        );
        batch
    }

    /// Correlate one engine response with the tracked batch.
    pub fn on_response<E: Display>(
        &mut self,
        request_id: RequestId,
        result: Result<RoutingResult, E>,
    ) -> Result<ResponseOutcome, SessionError> {
        if self.tracker.is_stale(request_id) {
            tracing::debug!("Dropping stale response for {}", request_id);
            return Ok(ResponseOutcome::Stale);
        }

        let uses_synthetic_midpoints = self
            .tracker
            .mark_completed(request_id, result.is_ok())
            .map(|sub| sub.uses_synthetic_midpoints)
            .unwrap_or(false);

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!("Routing request {} failed: {}", request_id, err);
                // Released records stay readable through `safety_records()`
                self.release_if_unblockable();
                return Err(SessionError::RequestFailed {
                    request_id,
                    message: err.to_string(),
                });
            }
        };

        let mut added: Vec<Path> = Vec::new();
        for path in &result.paths {
            let restored = restore(path, uses_synthetic_midpoints);
            let duplicate = self
                .paths
                .iter()
                .chain(added.iter())
                .any(|existing| existing.same_geometry(&restored));
            if duplicate {
                tracing::trace!("Skipping duplicate path from {}", request_id);
                continue;
            }
            added.push(restored);
        }

        let added_ids: Vec<PathId> = added.iter().map(|p| p.id).collect();
        let mut records = Vec::new();
        if !added.is_empty() {
            self.paths.extend(added.iter().cloned());
            self.paths.sort_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(Ordering::Equal)
            });
            self.selected = self.paths.first().map(|p| p.id);

            records = self.safety.observe(PathBatch {
                paths: added,
                uses_synthetic_midpoints,
            });
        }
        records.extend(self.release_if_unblockable());

        tracing::debug!(
            "{} merged {} new path(s), {} total, {} record(s) released",
            request_id,
            added_ids.len(),
            self.paths.len(),
            records.len()
        );
        Ok(ResponseOutcome::Merged {
            added: added_ids,
            records,
        })
    }

    /// Held-back batches wait for a decoy response. Once no decoy is still
    /// in flight nothing can lift the barrier, so score them now.
    fn release_if_unblockable(&mut self) -> Vec<PathSafetyRecord> {
        if self.safety.pending_batches() == 0 || self.decoys_outstanding() {
            return Vec::new();
        }
        tracing::debug!("No decoy response outstanding, releasing held paths");
        self.safety.flush()
    }

    fn decoys_outstanding(&self) -> bool {
        self.tracker
            .sub_requests()
            .iter()
            .any(|s| s.uses_synthetic_midpoints && s.state == RequestState::Sent)
    }

    /// Change the active path without re-routing.
    pub fn select_path(&mut self, id: PathId) -> Result<&Path, SessionError> {
        let path = self
            .paths
            .iter()
            .find(|p| p.id == id)
            .ok_or(SessionError::UnknownPath(id))?;
        self.selected = Some(id);
        Ok(path)
    }

    /// Reset batch, paths and scores.
    pub fn clear(&mut self) {
        self.tracker.clear();
        self.reset_results();
    }

    fn reset_results(&mut self) {
        self.paths.clear();
        self.selected = None;
        self.safety.clear();
    }

    /// Merged paths, shortest first.
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn selected_path(&self) -> Option<&Path> {
        let id = self.selected?;
        self.paths.iter().find(|p| p.id == id)
    }

    pub fn safety_records(&self) -> &[PathSafetyRecord] {
        self.safety.records()
    }

    pub fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    pub fn synthesizer(&self) -> &SafetySynthesizer {
        &self.safety
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            paths: self.paths.clone(),
            selected_path: self.selected_path().cloned(),
            safety_records: self.safety.records().to_vec(),
            sub_requests: self.tracker.sub_requests().to_vec(),
        }
    }
}
