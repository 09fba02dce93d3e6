//! Query state: ordered waypoints plus routing options.
//!
//! Every edit keeps the role invariant: first point is `From`, last is `To`,
//! everything in between is `Via`.

use serde::{Deserialize, Serialize};

use crate::error::BuildError;
use crate::models::{Coordinate, CustomModel, RoutingProfile, Waypoint, WaypointRole};
use crate::rules::RoutingRules;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    waypoints: Vec<Waypoint>,
    next_waypoint_id: u32,
    pub profile: RoutingProfile,
    pub max_alternatives: u32,
    pub custom_model_enabled: bool,
    pub custom_model_text: String,
    pub safe_routing_enabled: bool,
}

impl Default for Query {
    fn default() -> Self {
        Self::with_defaults(&RoutingRules::default())
    }
}

impl Query {
    /// Two empty points and the option defaults from `rules`.
    pub fn with_defaults(rules: &RoutingRules) -> Self {
        let mut query = Self {
            waypoints: Vec::new(),
            next_waypoint_id: 0,
            profile: RoutingProfile::default(),
            max_alternatives: rules.max_alternatives,
            custom_model_enabled: false,
            custom_model_text: String::new(),
            safe_routing_enabled: rules.safe_routing_enabled,
        };
        query.pad_to_two();
        query
    }

    /// Convenience constructor for a fully initialized query.
    pub fn from_coordinates(
        rules: &RoutingRules,
        profile: impl Into<String>,
        points: &[Coordinate],
    ) -> Self {
        let mut query = Self::with_defaults(rules);
        query.profile = RoutingProfile::new(profile);
        query.set_points(points.iter().map(|c| (*c, String::new(), true)).collect());
        query
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.waypoints.iter().map(|w| w.coordinate).collect()
    }

    /// Place or re-place an existing point. Returns false for an unknown id.
    pub fn set_point(&mut self, id: u32, coordinate: Coordinate, label: impl Into<String>) -> bool {
        let Some(point) = self.waypoints.iter_mut().find(|w| w.id == id) else {
            return false;
        };
        point.coordinate = coordinate;
        point.label = label.into();
        point.initialized = true;
        true
    }

    /// Insert a new point at `at_index` (clamped to the end). Returns its id.
    pub fn add_point(&mut self, at_index: usize, coordinate: Coordinate, initialized: bool) -> u32 {
        let id = self.take_id();
        let label = if initialized {
            format!("{:.6},{:.6}", coordinate.lat, coordinate.lng)
        } else {
            String::new()
        };
        let index = at_index.min(self.waypoints.len());
        self.waypoints.insert(
            index,
            Waypoint {
                id,
                coordinate,
                label,
                initialized,
                role: WaypointRole::Via,
            },
        );
        self.assign_roles();
        id
    }

    /// Remove a point. A query never drops below two points: removing from
    /// a two-point query leaves an empty point in its place.
    pub fn remove_point(&mut self, id: u32) -> bool {
        let before = self.waypoints.len();
        self.waypoints.retain(|w| w.id != id);
        let removed = self.waypoints.len() != before;
        if removed {
            self.pad_to_two();
        }
        removed
    }

    /// Move a point so it ends up at `new_index` in the resulting order.
    pub fn move_point(&mut self, id: u32, new_index: usize) -> bool {
        if new_index >= self.waypoints.len() {
            return false;
        }
        let Some(current) = self.waypoints.iter().position(|w| w.id == id) else {
            return false;
        };
        let point = self.waypoints.remove(current);
        self.waypoints.insert(new_index, point);
        self.assign_roles();
        true
    }

    pub fn invalidate_point(&mut self, id: u32) -> bool {
        match self.waypoints.iter_mut().find(|w| w.id == id) {
            Some(point) => {
                point.initialized = false;
                true
            }
            None => false,
        }
    }

    /// Reset every point to an empty, uninitialized placeholder.
    pub fn clear_points(&mut self) {
        for point in &mut self.waypoints {
            point.coordinate = Coordinate::new(0.0, 0.0);
            point.label.clear();
            point.initialized = false;
        }
    }

    /// Replace all points. Pads to two points when fewer are given.
    pub fn set_points(&mut self, points: Vec<(Coordinate, String, bool)>) {
        self.waypoints.clear();
        for (coordinate, label, initialized) in points {
            let id = self.take_id();
            let label = if initialized && label.is_empty() {
                format!("{:.6},{:.6}", coordinate.lat, coordinate.lng)
            } else {
                label
            };
            self.waypoints.push(Waypoint {
                id,
                coordinate,
                label,
                initialized,
                role: WaypointRole::Via,
            });
        }
        self.pad_to_two();
    }

    pub fn set_profile(&mut self, profile: impl Into<String>) {
        self.profile = RoutingProfile::new(profile);
    }

    pub fn set_custom_model(&mut self, text: impl Into<String>) {
        self.custom_model_text = text.into();
    }

    pub fn set_custom_model_enabled(&mut self, enabled: bool) {
        self.custom_model_enabled = enabled;
    }

    /// Number of paths the full-alternatives request asks for. Clamped to at least one.
    pub fn set_max_alternatives(&mut self, max_alternatives: u32) {
        self.max_alternatives = max_alternatives.max(1);
    }

    pub fn toggle_safe_routing(&mut self) {
        self.safe_routing_enabled = !self.safe_routing_enabled;
    }

    /// Parsed custom model, or `None` when the feature is disabled.
    pub fn custom_model(&self) -> Result<Option<CustomModel>, BuildError> {
        if !self.custom_model_enabled {
            return Ok(None);
        }
        serde_json::from_str::<CustomModel>(&self.custom_model_text)
            .map(Some)
            .map_err(|err| BuildError::InvalidCustomModel {
                reason: err.to_string(),
            })
    }

    /// Check every precondition for routing.
    pub fn ready_to_route(&self) -> Result<(), BuildError> {
        self.custom_model()?;
        if self.waypoints.len() < 2 {
            return Err(BuildError::NotReady {
                reason: "at least two points are required".to_string(),
            });
        }
        if let Some(point) = self.waypoints.iter().find(|w| !w.initialized) {
            return Err(BuildError::NotReady {
                reason: format!("point {} is not set", point.id),
            });
        }
        if self.profile.name.is_empty() {
            return Err(BuildError::NotReady {
                reason: "no routing profile selected".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_ready_to_route(&self) -> bool {
        self.ready_to_route().is_ok()
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_waypoint_id;
        self.next_waypoint_id += 1;
        id
    }

    fn pad_to_two(&mut self) {
        while self.waypoints.len() < 2 {
            let id = self.take_id();
            self.waypoints.push(Waypoint {
                id,
                coordinate: Coordinate::new(0.0, 0.0),
                label: String::new(),
                initialized: false,
                role: WaypointRole::Via,
            });
        }
        self.assign_roles();
    }

    fn assign_roles(&mut self) {
        let count = self.waypoints.len();
        for (index, point) in self.waypoints.iter_mut().enumerate() {
            point.role = WaypointRole::for_index(index, count);
        }
    }
}
