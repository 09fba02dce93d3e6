//! Routing rules and thresholds for request building and safety scoring.

use serde::{Deserialize, Serialize};

use crate::spatial::COORDINATE_TOLERANCE_DEG;

/// Configuration for request fan-out and score synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingRules {
    /// Alternatives requested by the full-alternatives request
    pub max_alternatives: u32,
    /// Send decoy requests and rank scores by request variant
    pub safe_routing_enabled: bool,
    /// Number of decoy requests per query in safe mode
    pub decoy_requests: usize,
    /// Longest leg (meters) for which non-motor profiles still ask for alternatives
    pub alternatives_distance_limit_m: f64,
    /// Longest leg (meters) for which custom-model requests keep alternatives
    pub custom_model_alternatives_limit_m: f64,
    /// Longest leg (meters) a custom-model query may span at all
    pub custom_model_distance_limit_m: f64,
    /// Coordinate match tolerance in degrees
    pub coordinate_tolerance_deg: f64,
    /// Decimal places kept on segment and overall scores
    pub score_precision: u32,
    /// Score distributions by rank
    pub safest: ScoreDistribution,
    pub second_safest: ScoreDistribution,
    pub other: ScoreDistribution,
}

impl Default for RoutingRules {
    fn default() -> Self {
        Self {
            max_alternatives: 4,
            safe_routing_enabled: true,
            decoy_requests: 3,
            alternatives_distance_limit_m: 500_000.0,
            custom_model_alternatives_limit_m: 200_000.0,
            custom_model_distance_limit_m: 500_000.0,
            coordinate_tolerance_deg: COORDINATE_TOLERANCE_DEG,
            score_precision: 2,
            safest: ScoreDistribution { mean: 5.0, stdev: 0.5 },
            second_safest: ScoreDistribution { mean: 4.5, stdev: 0.5 },
            other: ScoreDistribution { mean: 4.0, stdev: 1.0 },
        }
    }
}

impl RoutingRules {
    /// Distribution segments of a path with the given rank are drawn from.
    pub fn distribution_for_rank(&self, rank: u32) -> ScoreDistribution {
        match rank {
            1 => self.safest,
            2 => self.second_safest,
            _ => self.other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub mean: f64,
    pub stdev: f64,
}

/// Bounds of a safety score.
pub const MIN_SAFETY_SCORE: f64 = 1.0;
pub const MAX_SAFETY_SCORE: f64 = 5.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_distributions() {
        let rules = RoutingRules::default();
        assert_eq!(rules.distribution_for_rank(1), ScoreDistribution { mean: 5.0, stdev: 0.5 });
        assert_eq!(rules.distribution_for_rank(2), ScoreDistribution { mean: 4.5, stdev: 0.5 });
        assert_eq!(rules.distribution_for_rank(3), ScoreDistribution { mean: 4.0, stdev: 1.0 });
        assert_eq!(rules.distribution_for_rank(9), ScoreDistribution { mean: 4.0, stdev: 1.0 });
    }

    #[test]
    fn partial_config_fills_defaults() {
        let rules: RoutingRules =
            serde_json::from_str(r#"{"safe_routing_enabled": false, "decoy_requests": 1}"#).unwrap();
        assert!(!rules.safe_routing_enabled);
        assert_eq!(rules.decoy_requests, 1);
        assert_eq!(rules.max_alternatives, 4);
    }
}
