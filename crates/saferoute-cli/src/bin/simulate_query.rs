//! CLI tool to exercise the safety coordinator against a simulated engine.
//!
//! No routing service needed: paths are straight, densified legs and
//! latencies are random, so responses arrive out of order.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use saferoute_cli::{init_tracing, parse_point, print_report, run_query, Config};
use saferoute_sdk::{Coordinator, Query, RoutingRules, SimulatedConfig, SimulatedEngine};

/// Run a routing query against the simulated engine
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Waypoint as lat,lng (repeat, at least two)
    #[arg(long = "point", num_args = 1, allow_hyphen_values = true)]
    points: Vec<String>,

    /// Routing profile
    #[arg(long, default_value = "foot")]
    profile: String,

    /// Paths asked for by the alternatives request
    #[arg(long, default_value_t = 4)]
    alternatives: u32,

    /// Lower bound of simulated latency in milliseconds
    #[arg(long, default_value_t = 50)]
    min_latency: u64,

    /// Upper bound of simulated latency in milliseconds
    #[arg(long, default_value_t = 400)]
    max_latency: u64,

    /// Probability of a simulated request failure
    #[arg(long, default_value_t = 0.0)]
    failure_rate: f64,

    /// Seed for decoys, scores and latencies
    #[arg(long)]
    seed: Option<u64>,

    /// Skip decoy requests and rank-based scoring
    #[arg(long)]
    plain: bool,

    /// Print the session snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&["saferoute=debug", "simulate_query=debug"])?;
    let args = Args::parse();
    let config = Config::from_env();

    let points = if args.points.is_empty() {
        // Downtown Madison to the UW campus
        vec![parse_point("43.0747,-89.3841")?, parse_point("43.0766,-89.4125")?]
    } else {
        args.points
            .iter()
            .map(|p| parse_point(p))
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let rules = RoutingRules {
        safe_routing_enabled: config.safe_mode && !args.plain,
        max_alternatives: args.alternatives,
        ..RoutingRules::default()
    };
    let sim = SimulatedConfig {
        latency_ms: (args.min_latency, args.max_latency.max(args.min_latency)),
        failure_rate: args.failure_rate.clamp(0.0, 1.0),
        ..SimulatedConfig::default()
    };
    let coordinator = match args.seed {
        Some(seed) => Coordinator::spawn_with_seed(
            Arc::new(SimulatedEngine::with_seed(sim, seed)),
            rules.clone(),
            seed,
        ),
        None => Coordinator::spawn(Arc::new(SimulatedEngine::new(sim)), rules.clone()),
    };

    println!("Simulating {} point(s), profile {}", points.len(), args.profile);
    let query = Query::from_coordinates(&rules, args.profile.as_str(), &points);
    let wait = Duration::from_millis(args.max_latency.saturating_mul(4) + 1_000);
    let snapshot = run_query(&coordinator, query, wait).await?;
    coordinator.shutdown().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_report(&snapshot);
    }
    Ok(())
}
