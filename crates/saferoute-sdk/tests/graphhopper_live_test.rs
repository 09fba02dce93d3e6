//! GraphHopper adapter integration tests.
//!
//! Run with: cargo test --test graphhopper_live_test -- --ignored
//!
//! Note: Requires a GraphHopper instance at http://localhost:8989
//! or set SAFEROUTE_ENGINE_URL (and SAFEROUTE_ENGINE_KEY if needed).

use saferoute_core::{Coordinate, RequestId, RoutingRequest};
use saferoute_sdk::{GraphHopperClient, GraphHopperConfig, RoutingEngine};

fn client() -> GraphHopperClient {
    GraphHopperClient::new(GraphHopperConfig {
        base_url: std::env::var("SAFEROUTE_ENGINE_URL")
            .unwrap_or_else(|_| "http://localhost:8989".to_string()),
        api_key: std::env::var("SAFEROUTE_ENGINE_KEY").ok(),
        timeout_secs: 20,
    })
    .expect("Failed to build client")
}

fn request(points: Vec<Coordinate>, max_alternatives: u32) -> RoutingRequest {
    RoutingRequest {
        id: RequestId::next(),
        points,
        profile: std::env::var("SAFEROUTE_TEST_PROFILE").unwrap_or_else(|_| "car".to_string()),
        max_alternatives,
        custom_model: None,
    }
}

// Coordinates inside the Berlin extract GraphHopper ships with
fn berlin() -> Vec<Coordinate> {
    vec![
        Coordinate::new(52.5170, 13.3889),
        Coordinate::new(52.5080, 13.3760),
    ]
}

#[tokio::test]
#[ignore] // Run only when an engine is running
async fn test_route_returns_geometry_and_snapped_points() {
    let result = client()
        .route(&request(berlin(), 1))
        .await
        .expect("Route request failed");
    assert!(!result.paths.is_empty());
    let path = &result.paths[0];
    assert!(path.geometry.len() >= 2);
    assert_eq!(path.snapped_waypoints.len(), 2);
    assert!(path.distance > 0.0);
}

#[tokio::test]
#[ignore]
async fn test_alternative_route_returns_several_paths() {
    let result = client()
        .route(&request(berlin(), 3))
        .await
        .expect("Route request failed");
    assert!(!result.paths.is_empty());
    assert!(result.paths.len() <= 3);
}

#[tokio::test]
#[ignore]
async fn test_decoy_shaped_request_snaps_three_points() {
    let points = berlin();
    let mid = Coordinate::new(
        (points[0].lat + points[1].lat) / 2.0,
        (points[0].lng + points[1].lng) / 2.0,
    );
    let result = client()
        .route(&request(vec![points[0], mid, points[1]], 1))
        .await
        .expect("Route request failed");
    assert_eq!(result.paths[0].snapped_waypoints.len(), 3);
}
