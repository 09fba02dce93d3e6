//! Routing engine port.

use async_trait::async_trait;
use thiserror::Error;

use saferoute_core::{RoutingRequest, RoutingResult};

/// Errors returned by a routing engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Engine returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Could not decode engine response: {0}")]
    Decode(String),

    #[error("Engine did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

/// Port for anything that can answer a routing request.
///
/// Calls may complete in any order; callers correlate answers by
/// `request.id`.
#[async_trait]
pub trait RoutingEngine: Send + Sync {
    async fn route(&self, request: &RoutingRequest) -> Result<RoutingResult, EngineError>;
}

#[async_trait]
impl<T: RoutingEngine + ?Sized> RoutingEngine for std::sync::Arc<T> {
    async fn route(&self, request: &RoutingRequest) -> Result<RoutingResult, EngineError> {
        (**self).route(request).await
    }
}
