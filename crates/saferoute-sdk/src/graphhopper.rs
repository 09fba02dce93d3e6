//! GraphHopper HTTP adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use saferoute_core::{Coordinate, CustomModel, Path, RoutingRequest, RoutingResult};

use crate::engine::{EngineError, RoutingEngine};

/// Path details requested alongside every route.
pub const PATH_DETAILS: &[&str] = &[
    "road_class",
    "road_environment",
    "road_access",
    "max_speed",
    "street_name",
    "track_type",
    "toll",
    "country",
    "get_off_bike",
];

#[derive(Debug, Clone)]
pub struct GraphHopperConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GraphHopperConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8989".to_string(),
            api_key: None,
            timeout_secs: 10,
        }
    }
}

/// Routing engine backed by a GraphHopper `/route` endpoint.
#[derive(Debug, Clone)]
pub struct GraphHopperClient {
    config: GraphHopperConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct RouteBody<'a> {
    points: Vec<[f64; 2]>,
    profile: &'a str,
    points_encoded: bool,
    instructions: bool,
    details: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    algorithm: Option<&'static str>,
    #[serde(
        rename = "alternative_route.max_paths",
        skip_serializing_if = "Option::is_none"
    )]
    max_paths: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_model: Option<&'a CustomModel>,
    #[serde(rename = "ch.disable", skip_serializing_if = "Option::is_none")]
    ch_disable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    paths: Vec<ResponsePath>,
}

#[derive(Debug, Deserialize)]
struct ResponsePath {
    distance: f64,
    time: u64,
    points: LineString,
    #[serde(default)]
    snapped_waypoints: Option<LineString>,
    #[serde(default)]
    details: Value,
}

#[derive(Debug, Deserialize)]
struct LineString {
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl GraphHopperClient {
    pub fn new(config: GraphHopperConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GraphHopperConfig {
        &self.config
    }

    fn route_url(&self) -> String {
        format!("{}/route", self.config.base_url.trim_end_matches('/'))
    }

    /// POST `/route` with the key, if any, as an encoded query parameter.
    fn route_request(&self, body: &RouteBody<'_>) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(self.route_url());
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            builder = builder.query(&[("key", key)]);
        }
        builder.json(body)
    }
}

fn route_body(request: &RoutingRequest) -> RouteBody<'_> {
    let alternatives = request.max_alternatives > 1;
    RouteBody {
        points: request.points.iter().map(|c| c.to_lng_lat()).collect(),
        profile: &request.profile,
        points_encoded: false,
        instructions: false,
        details: PATH_DETAILS,
        algorithm: alternatives.then_some("alternative_route"),
        max_paths: alternatives.then_some(request.max_alternatives),
        custom_model: request.custom_model.as_ref(),
        ch_disable: request.custom_model.as_ref().map(|_| true),
    }
}

fn to_coordinates(line: &LineString) -> Result<Vec<Coordinate>, EngineError> {
    line.coordinates
        .iter()
        .map(|pair| match pair.as_slice() {
            // Elevation, when present, is dropped
            [lng, lat, ..] => Ok(Coordinate::new(*lat, *lng)),
            _ => Err(EngineError::Decode(format!(
                "coordinate with {} value(s)",
                pair.len()
            ))),
        })
        .collect()
}

fn to_result(response: RouteResponse) -> Result<RoutingResult, EngineError> {
    let mut paths = Vec::with_capacity(response.paths.len());
    for raw in response.paths {
        let geometry = to_coordinates(&raw.points)?;
        let snapped = match raw.snapped_waypoints.as_ref() {
            Some(line) => to_coordinates(line)?,
            None => Vec::new(),
        };
        paths.push(Path::new(geometry, raw.distance, raw.time, snapped).with_details(raw.details));
    }
    Ok(RoutingResult { paths })
}

#[async_trait]
impl RoutingEngine for GraphHopperClient {
    async fn route(&self, request: &RoutingRequest) -> Result<RoutingResult, EngineError> {
        let body = route_body(request);
        let response = self
            .route_request(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    EngineError::Timeout(Duration::from_secs(self.config.timeout_secs))
                } else if err.is_connect() {
                    EngineError::Unavailable(err.to_string())
                } else {
                    EngineError::Http(err)
                }
            })?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.message)
                .unwrap_or(text);
            tracing::debug!("GraphHopper {} for {}: {}", status, request.id, message);
            return Err(EngineError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: RouteResponse =
            serde_json::from_str(&text).map_err(|err| EngineError::Decode(err.to_string()))?;
        to_result(parsed)
    }
}
