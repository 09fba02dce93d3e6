//! SafeRoute SDK - async routing coordination
//!
//! Runs routing sessions against a routing engine and streams path and
//! safety updates to subscribers.

pub mod coordinator;
pub mod engine;
pub mod graphhopper;
pub mod simulated;

pub use coordinator::{Coordinator, CoordinatorError, SessionEvent};
pub use engine::{EngineError, RoutingEngine};
pub use graphhopper::{GraphHopperClient, GraphHopperConfig};
pub use saferoute_core::{Query, RoutingRules};
pub use simulated::{SimulatedConfig, SimulatedEngine};
