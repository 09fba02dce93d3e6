//! Straight-line routing engine for demos and tests.
//!
//! Paths follow great-circle-ish straight legs between the request points,
//! densified so overlapping requests share segments. Alternatives bend each
//! leg sideways through a detour point.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use saferoute_core::spatial::{distance_m, offset_by_bearing};
use saferoute_core::{Coordinate, Path, RoutingProfile, RoutingRequest, RoutingResult};

use crate::engine::{EngineError, RoutingEngine};

#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Spacing of interpolated geometry points, meters
    pub step_m: f64,
    /// Per-request latency is drawn uniformly from this range
    pub latency_ms: (u64, u64),
    /// Probability in `[0, 1]` that a request fails
    pub failure_rate: f64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            step_m: 250.0,
            latency_ms: (0, 0),
            failure_rate: 0.0,
        }
    }
}

pub struct SimulatedEngine {
    config: SimulatedConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedEngine {
    pub fn new(config: SimulatedConfig) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn with_seed(config: SimulatedConfig, seed: u64) -> Self {
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Draw latency and failure outcome up front so the lock is never held
    /// across an await.
    fn roll(&self) -> (Duration, bool) {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (min, max) = self.config.latency_ms;
        let latency = if max > min {
            rng.random_range(min..=max)
        } else {
            min
        };
        let fails = self.config.failure_rate > 0.0 && rng.random::<f64>() < self.config.failure_rate;
        (Duration::from_millis(latency), fails)
    }

    fn plan(&self, request: &RoutingRequest) -> RoutingResult {
        let speed = speed_mps(&RoutingProfile::new(request.profile.clone()));
        let paths = (0..request.max_alternatives.max(1))
            .map(|variant| {
                let geometry = self.geometry(&request.points, variant);
                let distance: f64 = geometry.windows(2).map(|p| distance_m(p[0], p[1])).sum();
                let duration_ms = (distance / speed * 1000.0).round() as u64;
                Path::new(geometry, distance, duration_ms, request.points.clone())
            })
            .collect();
        RoutingResult { paths }
    }

    fn geometry(&self, points: &[Coordinate], variant: u32) -> Vec<Coordinate> {
        let mut geometry = Vec::new();
        for (leg, pair) in points.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            let mut corners = vec![a];
            if variant > 0 {
                corners.push(detour(a, b, variant));
            }
            corners.push(b);
            for (i, corner) in corners.windows(2).enumerate() {
                let skip_first = leg > 0 || i > 0;
                geometry.extend(
                    densify(corner[0], corner[1], self.config.step_m)
                        .into_iter()
                        .skip(usize::from(skip_first)),
                );
            }
        }
        if geometry.is_empty() {
            geometry.extend(points.first().copied());
        }
        geometry
    }
}

#[async_trait]
impl RoutingEngine for SimulatedEngine {
    async fn route(&self, request: &RoutingRequest) -> Result<RoutingResult, EngineError> {
        let (latency, fails) = self.roll();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if fails {
            return Err(EngineError::Unavailable(format!(
                "simulated failure for {}",
                request.id
            )));
        }
        if request.points.len() < 2 {
            return Err(EngineError::Status {
                status: 400,
                message: "at least two points are required".to_string(),
            });
        }
        Ok(self.plan(request))
    }
}

fn speed_mps(profile: &RoutingProfile) -> f64 {
    if profile.is_motor_vehicle() {
        13.9
    } else if profile.name.contains("bike") {
        4.5
    } else {
        1.4
    }
}

/// Point off to the side of the leg's midpoint, alternating sides per variant.
fn detour(a: Coordinate, b: Coordinate, variant: u32) -> Coordinate {
    let mid = Coordinate::new((a.lat + b.lat) / 2.0, (a.lng + b.lng) / 2.0);
    let heading = (b.lng - a.lng).atan2(b.lat - a.lat);
    let side = if variant % 2 == 1 { 1.0 } else { -1.0 };
    let reach = distance_m(a, b) * 0.15 * f64::from(variant.div_ceil(2));
    let (lat, lng) = offset_by_bearing(
        mid.lat,
        mid.lng,
        reach,
        heading + side * std::f64::consts::FRAC_PI_2,
    );
    Coordinate::new(lat, lng)
}

/// Both endpoints included, intermediate points at most `step_m` apart.
fn densify(a: Coordinate, b: Coordinate, step_m: f64) -> Vec<Coordinate> {
    let length = distance_m(a, b);
    let steps = if step_m > 0.0 {
        (length / step_m).ceil().max(1.0) as usize
    } else {
        1
    };
    (0..=steps)
        .map(|i| {
            if i == steps {
                return b;
            }
            let t = i as f64 / steps as f64;
            Coordinate::new(a.lat + (b.lat - a.lat) * t, a.lng + (b.lng - a.lng) * t)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use saferoute_core::RequestId;

    fn request(points: Vec<Coordinate>, max_alternatives: u32) -> RoutingRequest {
        RoutingRequest {
            id: RequestId::next(),
            points,
            profile: "foot".to_string(),
            max_alternatives,
            custom_model: None,
        }
    }

    #[tokio::test]
    async fn straight_path_passes_through_every_point() {
        let engine = SimulatedEngine::with_seed(SimulatedConfig::default(), 1);
        let points = vec![
            Coordinate::new(43.07, -89.40),
            Coordinate::new(43.08, -89.39),
            Coordinate::new(43.09, -89.40),
        ];
        let result = engine.route(&request(points.clone(), 1)).await.unwrap();
        assert_eq!(result.paths.len(), 1);
        let path = &result.paths[0];
        for p in &points {
            assert!(path.geometry.contains(p));
        }
        assert_eq!(path.snapped_waypoints, points);
        assert!(path.geometry.windows(2).all(|w| distance_m(w[0], w[1]) <= 251.0));
        assert!(path.duration_ms > 0);
    }

    #[tokio::test]
    async fn alternatives_have_distinct_geometry() {
        let engine = SimulatedEngine::with_seed(SimulatedConfig::default(), 2);
        let points = vec![Coordinate::new(43.07, -89.40), Coordinate::new(43.12, -89.33)];
        let result = engine.route(&request(points, 3)).await.unwrap();
        assert_eq!(result.paths.len(), 3);
        assert!(!result.paths[0].same_geometry(&result.paths[1]));
        assert!(!result.paths[1].same_geometry(&result.paths[2]));
        assert!(result.paths[1].distance > result.paths[0].distance);
    }

    #[tokio::test]
    async fn failure_rate_of_one_always_fails() {
        let engine = SimulatedEngine::with_seed(
            SimulatedConfig {
                failure_rate: 1.0,
                ..SimulatedConfig::default()
            },
            3,
        );
        let points = vec![Coordinate::new(43.07, -89.40), Coordinate::new(43.12, -89.33)];
        assert!(matches!(
            engine.route(&request(points, 1)).await,
            Err(EngineError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_applied() {
        let engine = SimulatedEngine::with_seed(
            SimulatedConfig {
                latency_ms: (500, 500),
                ..SimulatedConfig::default()
            },
            4,
        );
        let points = vec![Coordinate::new(43.07, -89.40), Coordinate::new(43.12, -89.33)];
        let start = tokio::time::Instant::now();
        engine.route(&request(points, 1)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
