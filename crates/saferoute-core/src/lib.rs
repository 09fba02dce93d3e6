pub mod builder;
pub mod error;
pub mod models;
pub mod query;
pub mod reconstruct;
pub mod rules;
pub mod safety;
pub mod session;
pub mod spatial;
pub mod tracker;

pub use builder::{splice_midpoints, RequestBuilder};
pub use error::{BuildError, SessionError};
pub use models::{
    Coordinate, CustomModel, Path, PathBatch, PathId, PathSafetyRecord, PlannedRequest,
    RequestId, RequestState, RoutingProfile, RoutingRequest, RoutingResult, Segment, SubRequest,
    Waypoint, WaypointRole,
};
pub use query::Query;
pub use reconstruct::restore;
pub use rules::{RoutingRules, ScoreDistribution};
pub use safety::{rank_paths, SafetySynthesizer, ScoreCache};
pub use session::{ResponseOutcome, RoutingSession, SessionSnapshot};
pub use spatial::haversine_distance;
pub use tracker::RequestTracker;
