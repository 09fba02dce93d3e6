//! Core data models for safe routing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `[lng, lat]`, the order routing engines expect on the wire.
    pub fn to_lng_lat(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointRole {
    From,
    To,
    Via,
}

impl WaypointRole {
    /// Role of the point at `index` in a query of `count` points.
    pub fn for_index(index: usize, count: usize) -> Self {
        if index == 0 {
            WaypointRole::From
        } else if index + 1 == count {
            WaypointRole::To
        } else {
            WaypointRole::Via
        }
    }
}

/// A user-placed query point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: u32,
    pub coordinate: Coordinate,
    pub label: String,
    pub initialized: bool,
    pub role: WaypointRole,
}

/// Routing profile as advertised by the engine (e.g. `car`, `bike`, `foot`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingProfile {
    pub name: String,
}

impl RoutingProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn is_motor_vehicle(&self) -> bool {
        const MOTOR_MARKERS: [&str; 5] = ["car", "truck", "scooter", "bus", "motorcycle"];
        MOTOR_MARKERS.iter().any(|marker| self.name.contains(marker))
    }
}

/// Engine-side cost customization. Unknown keys are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_influence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub areas: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Handle identifying one built request. Two structurally identical requests
/// built at different times get different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn next() -> Self {
        RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// A request to the routing engine. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub id: RequestId,
    pub points: Vec<Coordinate>,
    pub profile: String,
    pub max_alternatives: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_model: Option<CustomModel>,
}

/// A built request plus whether synthetic midpoints were spliced into it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRequest {
    pub request: RoutingRequest,
    pub uses_synthetic_midpoints: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Sent,
    Succeeded,
    Failed,
}

/// A tracked request within the current batch.
#[derive(Debug, Clone, Serialize)]
pub struct SubRequest {
    pub request: RoutingRequest,
    pub state: RequestState,
    pub uses_synthetic_midpoints: bool,
    pub sent_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Stable identity of a path, assigned once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathId(Uuid);

impl PathId {
    pub fn new() -> Self {
        PathId(Uuid::new_v4())
    }
}

impl Default for PathId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A route returned by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    pub id: PathId,
    pub geometry: Vec<Coordinate>,
    /// Meters
    pub distance: f64,
    /// Milliseconds
    pub duration_ms: u64,
    pub snapped_waypoints: Vec<Coordinate>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Path {
    /// Build a path with a freshly generated id.
    pub fn new(
        geometry: Vec<Coordinate>,
        distance: f64,
        duration_ms: u64,
        snapped_waypoints: Vec<Coordinate>,
    ) -> Self {
        Self {
            id: PathId::new(),
            geometry,
            distance,
            duration_ms,
            snapped_waypoints,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Pointwise geometry equality.
    pub fn same_geometry(&self, other: &Path) -> bool {
        self.geometry == other.geometry
    }
}

/// Engine output for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingResult {
    pub paths: Vec<Path>,
}

/// Directed pair of adjacent coordinates carrying a safety score in `[1, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Coordinate,
    pub to: Coordinate,
    pub safety_score: f64,
}

/// Scores for one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSafetyRecord {
    pub path_id: PathId,
    pub rank: u32,
    pub segments: Vec<Segment>,
    pub overall_score: f64,
}

/// Paths that arrived together in one response.
#[derive(Debug, Clone)]
pub struct PathBatch {
    pub paths: Vec<Path>,
    pub uses_synthetic_midpoints: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::next();
        let b = RequestId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn path_ids_are_not_derived_from_content() {
        let geometry = vec![Coordinate::new(1.0, 2.0), Coordinate::new(1.1, 2.1)];
        let a = Path::new(geometry.clone(), 10.0, 1000, vec![]);
        let b = Path::new(geometry, 10.0, 1000, vec![]);
        assert_ne!(a.id, b.id);
        assert!(a.same_geometry(&b));
    }

    #[test]
    fn motor_vehicle_profiles() {
        assert!(RoutingProfile::new("car").is_motor_vehicle());
        assert!(RoutingProfile::new("small_truck").is_motor_vehicle());
        assert!(!RoutingProfile::new("foot").is_motor_vehicle());
        assert!(!RoutingProfile::new("bike").is_motor_vehicle());
    }

    #[test]
    fn roles_follow_position() {
        assert_eq!(WaypointRole::for_index(0, 3), WaypointRole::From);
        assert_eq!(WaypointRole::for_index(1, 3), WaypointRole::Via);
        assert_eq!(WaypointRole::for_index(2, 3), WaypointRole::To);
    }

    #[test]
    fn custom_model_keeps_unknown_keys() {
        let model: CustomModel =
            serde_json::from_str(r#"{"distance_influence": 15, "turn_costs": true}"#).unwrap();
        assert_eq!(model.distance_influence, Some(15.0));
        assert_eq!(model.extra.get("turn_costs"), Some(&serde_json::Value::Bool(true)));
    }
}
