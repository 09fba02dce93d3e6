//! Request fan-out for a routing query.
//!
//! A ready query becomes a fast request, an optional full-alternatives
//! request and, in safe mode, a set of decoy requests whose waypoints have a
//! randomly sampled midpoint spliced between every consecutive pair.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::BuildError;
use crate::models::{Coordinate, CustomModel, PlannedRequest, RequestId, RoutingRequest};
use crate::query::Query;
use crate::rules::RoutingRules;
use crate::spatial::{max_leg_distance_m, sample_midpoint};

/// Builds routing requests. Owns its random source so decoy sampling can be
/// made deterministic in tests.
pub struct RequestBuilder {
    rules: RoutingRules,
    rng: StdRng,
}

impl RequestBuilder {
    pub fn new(rules: RoutingRules) -> Self {
        Self {
            rules,
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_seed(rules: RoutingRules, seed: u64) -> Self {
        Self {
            rules,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn rules(&self) -> &RoutingRules {
        &self.rules
    }

    /// Build the ordered list of requests for `query`.
    ///
    /// Order: fast request, full-alternatives request (when allowed), then
    /// decoys. Nothing is built when the query is not ready, the custom model
    /// does not parse, or a custom-model query spans too far.
    pub fn build(&mut self, query: &Query) -> Result<Vec<PlannedRequest>, BuildError> {
        query.ready_to_route()?;
        let custom_model = query.custom_model()?;
        let points = query.coordinates();
        let max_distance = max_leg_distance_m(&points);

        if custom_model.is_some() && max_distance >= self.rules.custom_model_distance_limit_m {
            tracing::info!(
                "Refusing custom model query spanning {:.0} m (limit {:.0} m)",
                max_distance,
                self.rules.custom_model_distance_limit_m
            );
            return Err(BuildError::CustomModelSpanExceeded {
                max_m: self.rules.custom_model_distance_limit_m,
                actual_m: max_distance,
            });
        }

        let planned = if query.safe_routing_enabled {
            self.build_safe(query, &points, custom_model, max_distance)
        } else {
            self.build_plain(query, &points, custom_model, max_distance)
        };

        tracing::debug!(
            "Built {} request(s) for {} point(s), {} decoy(s)",
            planned.len(),
            points.len(),
            planned.iter().filter(|p| p.uses_synthetic_midpoints).count()
        );
        Ok(planned)
    }

    fn build_safe(
        &mut self,
        query: &Query,
        points: &[Coordinate],
        custom_model: Option<CustomModel>,
        max_distance: f64,
    ) -> Vec<PlannedRequest> {
        let mut planned = self.fast_and_alternatives(query, points, &custom_model, max_distance);

        for _ in 0..self.rules.decoy_requests {
            let decoy_points = splice_midpoints(&mut self.rng, points);
            planned.push(PlannedRequest {
                request: request(query, decoy_points, 1, custom_model.clone()),
                uses_synthetic_midpoints: true,
            });
        }
        planned
    }

    fn build_plain(
        &mut self,
        query: &Query,
        points: &[Coordinate],
        custom_model: Option<CustomModel>,
        max_distance: f64,
    ) -> Vec<PlannedRequest> {
        if custom_model.is_some() {
            // Custom models are slow on the engine side: a single request,
            // without alternatives once the legs get long.
            let alternatives = if max_distance < self.rules.custom_model_alternatives_limit_m {
                query.max_alternatives
            } else {
                1
            };
            return vec![PlannedRequest {
                request: request(query, points.to_vec(), alternatives, custom_model),
                uses_synthetic_midpoints: false,
            }];
        }
        self.fast_and_alternatives(query, points, &custom_model, max_distance)
    }

    fn fast_and_alternatives(
        &self,
        query: &Query,
        points: &[Coordinate],
        custom_model: &Option<CustomModel>,
        max_distance: f64,
    ) -> Vec<PlannedRequest> {
        let mut planned = vec![PlannedRequest {
            request: request(query, points.to_vec(), 1, custom_model.clone()),
            uses_synthetic_midpoints: false,
        }];

        let wants_alternatives = points.len() == 2
            && query.max_alternatives > 1
            && (query.profile.is_motor_vehicle()
                || max_distance < self.rules.alternatives_distance_limit_m);
        if wants_alternatives {
            planned.push(PlannedRequest {
                request: request(
                    query,
                    points.to_vec(),
                    query.max_alternatives,
                    custom_model.clone(),
                ),
                uses_synthetic_midpoints: false,
            });
        }
        planned
    }
}

fn request(
    query: &Query,
    points: Vec<Coordinate>,
    max_alternatives: u32,
    custom_model: Option<CustomModel>,
) -> RoutingRequest {
    RoutingRequest {
        id: RequestId::next(),
        points,
        profile: query.profile.name.clone(),
        max_alternatives,
        custom_model,
    }
}

/// Insert one sampled midpoint between every consecutive pair. The original
/// points end up at even indices, the synthetic ones at odd indices.
pub fn splice_midpoints<R: Rng + ?Sized>(rng: &mut R, points: &[Coordinate]) -> Vec<Coordinate> {
    let mut spliced = Vec::with_capacity(points.len() * 2);
    for pair in points.windows(2) {
        spliced.push(pair[0]);
        spliced.push(sample_midpoint(rng, pair[0], pair[1]));
    }
    if let Some(last) = points.last() {
        spliced.push(*last);
    }
    spliced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::offset_by_bearing;

    const MADISON: Coordinate = Coordinate {
        lat: 43.0731,
        lng: -89.4012,
    };

    fn point_at(distance_m: f64) -> Coordinate {
        let (lat, lng) =
            offset_by_bearing(MADISON.lat, MADISON.lng, distance_m, std::f64::consts::FRAC_PI_2);
        Coordinate::new(lat, lng)
    }

    fn query(profile: &str, points: &[Coordinate]) -> Query {
        Query::from_coordinates(&RoutingRules::default(), profile, points)
    }

    #[test]
    fn safe_mode_builds_fast_alternatives_and_three_decoys() {
        let mut builder = RequestBuilder::with_seed(RoutingRules::default(), 1);
        let planned = builder
            .build(&query("foot", &[MADISON, point_at(10_000.0)]))
            .unwrap();

        assert_eq!(planned.len(), 5);
        assert_eq!(planned[0].request.max_alternatives, 1);
        assert!(!planned[0].uses_synthetic_midpoints);
        assert_eq!(planned[1].request.max_alternatives, 4);
        assert!(!planned[1].uses_synthetic_midpoints);
        for decoy in &planned[2..] {
            assert!(decoy.uses_synthetic_midpoints);
            assert_eq!(decoy.request.max_alternatives, 1);
            assert_eq!(decoy.request.points.len(), 3);
            assert_eq!(decoy.request.points[0], MADISON);
        }
    }

    #[test]
    fn request_ids_are_distinct_per_build() {
        let mut builder = RequestBuilder::with_seed(RoutingRules::default(), 1);
        let q = query("car", &[MADISON, point_at(2_000.0)]);
        let first = builder.build(&q).unwrap();
        let second = builder.build(&q).unwrap();
        assert_ne!(first[0].request.id, second[0].request.id);
        assert_eq!(first[0].request.points, second[0].request.points);
    }

    #[test]
    fn via_points_skip_the_alternatives_request() {
        let mut builder = RequestBuilder::with_seed(RoutingRules::default(), 2);
        let planned = builder
            .build(&query("car", &[MADISON, point_at(3_000.0), point_at(6_000.0)]))
            .unwrap();
        assert_eq!(planned.len(), 4);
        assert!(planned[1..].iter().all(|p| p.uses_synthetic_midpoints));
        assert!(planned[1..].iter().all(|p| p.request.points.len() == 5));
    }

    #[test]
    fn long_non_motor_routes_skip_alternatives() {
        let mut builder = RequestBuilder::with_seed(RoutingRules::default(), 3);
        let far = point_at(600_000.0);

        let foot = builder.build(&query("foot", &[MADISON, far])).unwrap();
        assert_eq!(foot.iter().filter(|p| !p.uses_synthetic_midpoints).count(), 1);

        let car = builder.build(&query("car", &[MADISON, far])).unwrap();
        assert_eq!(car.iter().filter(|p| !p.uses_synthetic_midpoints).count(), 2);
    }

    #[test]
    fn plain_mode_has_no_decoys() {
        let mut builder = RequestBuilder::with_seed(RoutingRules::default(), 4);
        let mut q = query("car", &[MADISON, point_at(10_000.0)]);
        q.toggle_safe_routing();
        let planned = builder.build(&q).unwrap();
        assert_eq!(planned.len(), 2);
        assert!(planned.iter().all(|p| !p.uses_synthetic_midpoints));
    }

    #[test]
    fn plain_custom_model_alternatives_depend_on_span() {
        let mut builder = RequestBuilder::with_seed(RoutingRules::default(), 5);
        let mut near = query("car", &[MADISON, point_at(50_000.0)]);
        near.toggle_safe_routing();
        near.set_custom_model(r#"{"distance_influence": 15}"#);
        near.set_custom_model_enabled(true);
        let planned = builder.build(&near).unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].request.max_alternatives, 4);
        assert!(planned[0].request.custom_model.is_some());

        let mut mid = query("car", &[MADISON, point_at(300_000.0)]);
        mid.toggle_safe_routing();
        mid.set_custom_model(r#"{"distance_influence": 15}"#);
        mid.set_custom_model_enabled(true);
        let planned = builder.build(&mid).unwrap();
        assert_eq!(planned[0].request.max_alternatives, 1);
    }

    #[test]
    fn custom_model_span_is_refused() {
        let mut builder = RequestBuilder::with_seed(RoutingRules::default(), 6);
        let mut q = query("car", &[MADISON, point_at(650_000.0)]);
        q.set_custom_model("{}");
        q.set_custom_model_enabled(true);
        assert!(matches!(
            builder.build(&q),
            Err(BuildError::CustomModelSpanExceeded { .. })
        ));
    }

    #[test]
    fn unparsable_custom_model_builds_nothing() {
        let mut builder = RequestBuilder::with_seed(RoutingRules::default(), 7);
        let mut q = query("car", &[MADISON, point_at(1_000.0)]);
        q.set_custom_model("{ nope");
        q.set_custom_model_enabled(true);
        assert!(matches!(
            builder.build(&q),
            Err(BuildError::InvalidCustomModel { .. })
        ));
    }

    #[test]
    fn splice_keeps_originals_at_even_indices() {
        let mut rng = StdRng::seed_from_u64(9);
        let points = [MADISON, point_at(1_000.0), point_at(2_000.0), point_at(3_000.0)];
        let spliced = splice_midpoints(&mut rng, &points);
        assert_eq!(spliced.len(), 7);
        for (i, original) in points.iter().enumerate() {
            assert_eq!(spliced[i * 2], *original);
        }
    }
}
