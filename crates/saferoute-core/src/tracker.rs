//! Lifecycle tracking for the current batch of in-flight requests.

use chrono::Utc;

use crate::models::{PlannedRequest, RequestId, RequestState, SubRequest};

/// Owns the sub-requests of the active query. Submitting a new batch drops
/// the previous one, which turns every response still in flight for it stale.
#[derive(Debug, Default)]
pub struct RequestTracker {
    batch: Vec<SubRequest>,
    generation: u64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked batch. Every request starts at `Sent`.
    pub fn submit(&mut self, planned: Vec<PlannedRequest>) -> &[SubRequest] {
        let now = Utc::now();
        self.generation += 1;
        self.batch = planned
            .into_iter()
            .map(|p| SubRequest {
                request: p.request,
                state: RequestState::Sent,
                uses_synthetic_midpoints: p.uses_synthetic_midpoints,
                sent_at: now,
                completed_at: None,
            })
            .collect();
        &self.batch
    }

    /// True iff `id` is not part of the tracked batch.
    pub fn is_stale(&self, id: RequestId) -> bool {
        self.get(id).is_none()
    }

    pub fn get(&self, id: RequestId) -> Option<&SubRequest> {
        self.batch.iter().find(|s| s.request.id == id)
    }

    /// Record a finished request. Stale ids are ignored.
    pub fn mark_completed(&mut self, id: RequestId, success: bool) -> Option<&SubRequest> {
        let sub = self.batch.iter_mut().find(|s| s.request.id == id)?;
        sub.state = if success {
            RequestState::Succeeded
        } else {
            RequestState::Failed
        };
        let now = Utc::now();
        sub.completed_at = Some(now);
        tracing::debug!(
            "{} {:?} after {} ms",
            id,
            sub.state,
            (now - sub.sent_at).num_milliseconds()
        );
        Some(&*sub)
    }

    pub fn sub_requests(&self) -> &[SubRequest] {
        &self.batch
    }

    /// Bumped on every submit and clear.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        self.batch.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, RoutingRequest};

    fn planned(decoy: bool) -> PlannedRequest {
        PlannedRequest {
            request: RoutingRequest {
                id: RequestId::next(),
                points: vec![Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0)],
                profile: "car".to_string(),
                max_alternatives: 1,
                custom_model: None,
            },
            uses_synthetic_midpoints: decoy,
        }
    }

    #[test]
    fn submitted_requests_start_sent() {
        let mut tracker = RequestTracker::new();
        let batch = tracker.submit(vec![planned(false), planned(true)]);
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|s| s.state == RequestState::Sent));
        assert!(batch[1].uses_synthetic_midpoints);
    }

    #[test]
    fn replacing_the_batch_makes_old_requests_stale() {
        let mut tracker = RequestTracker::new();
        let a = planned(false);
        let a_id = a.request.id;
        tracker.submit(vec![a]);
        assert!(!tracker.is_stale(a_id));

        let b = planned(false);
        let b_id = b.request.id;
        tracker.submit(vec![b]);
        assert!(tracker.is_stale(a_id));
        assert!(!tracker.is_stale(b_id));
    }

    #[test]
    fn identical_content_is_not_identity() {
        let mut tracker = RequestTracker::new();
        let a = planned(false);
        let mut twin = a.clone();
        twin.request.id = RequestId::next();
        tracker.submit(vec![a]);
        assert!(tracker.is_stale(twin.request.id));
    }

    #[test]
    fn marking_a_stale_request_is_a_no_op() {
        let mut tracker = RequestTracker::new();
        tracker.submit(vec![planned(false)]);
        assert!(tracker.mark_completed(RequestId::next(), true).is_none());
        assert_eq!(tracker.sub_requests()[0].state, RequestState::Sent);
    }

    #[test]
    fn completion_marks_state_and_time() {
        let mut tracker = RequestTracker::new();
        let a = planned(false);
        let b = planned(true);
        let (a_id, b_id) = (a.request.id, b.request.id);
        tracker.submit(vec![a, b]);

        tracker.mark_completed(a_id, true);
        assert_eq!(tracker.sub_requests()[1].state, RequestState::Sent);
        let sub = tracker.mark_completed(b_id, false).unwrap();
        assert_eq!(sub.state, RequestState::Failed);
        assert!(sub.completed_at.is_some());
        assert_eq!(tracker.sub_requests()[0].state, RequestState::Succeeded);
    }

    #[test]
    fn clear_empties_the_batch() {
        let mut tracker = RequestTracker::new();
        let a = planned(false);
        let a_id = a.request.id;
        tracker.submit(vec![a]);
        let generation = tracker.generation();
        tracker.clear();
        assert!(tracker.sub_requests().is_empty());
        assert!(tracker.is_stale(a_id));
        assert!(tracker.generation() > generation);
    }
}
