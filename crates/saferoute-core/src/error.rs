//! Error types for request building and response correlation.

use thiserror::Error;

use crate::models::{PathId, RequestId};

/// Reasons a query cannot be turned into routing requests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("Query is not ready to route: {reason}")]
    NotReady { reason: String },

    #[error("Custom model could not be parsed: {reason}")]
    InvalidCustomModel { reason: String },

    #[error(
        "Using the custom model feature is not possible when the request points are further than {} km apart (got {} km)",
        km(.max_m),
        km(.actual_m)
    )]
    CustomModelSpanExceeded { max_m: f64, actual_m: f64 },
}

fn km(meters: &f64) -> f64 {
    (meters / 1000.0).round()
}

/// Errors surfaced while correlating responses with the session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Routing request {request_id} failed: {message}")]
    RequestFailed { request_id: RequestId, message: String },

    #[error("Unknown path: {0}")]
    UnknownPath(PathId),
}
