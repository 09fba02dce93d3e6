//! CLI tool to route a query through the safety coordinator against GraphHopper.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use saferoute_cli::{init_tracing, parse_point, print_report, run_query, Config};
use saferoute_sdk::{Coordinator, GraphHopperClient, GraphHopperConfig, Query, RoutingRules};

/// Route between points with decoy requests and synthetic safety scores
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Waypoint as lat,lng (repeat, at least two)
    #[arg(long = "point", required = true, num_args = 1, allow_hyphen_values = true)]
    points: Vec<String>,

    /// GraphHopper base URL (overrides SAFEROUTE_ENGINE_URL)
    #[arg(long)]
    url: Option<String>,

    /// GraphHopper API key (overrides SAFEROUTE_ENGINE_KEY)
    #[arg(long)]
    key: Option<String>,

    /// Routing profile
    #[arg(long, default_value = "car")]
    profile: String,

    /// Paths asked for by the alternatives request
    #[arg(long, default_value_t = 4)]
    alternatives: u32,

    /// JSON file holding a custom model
    #[arg(long)]
    custom_model: Option<std::path::PathBuf>,

    /// Skip decoy requests and rank-based scoring
    #[arg(long)]
    plain: bool,

    /// Seconds to wait for all responses
    #[arg(long, default_value_t = 30)]
    wait: u64,

    /// Print the session snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&["saferoute=info", "route_query=info"])?;
    let args = Args::parse();
    let config = Config::from_env();

    let engine = GraphHopperClient::new(GraphHopperConfig {
        base_url: args.url.clone().unwrap_or(config.engine_url),
        api_key: args.key.clone().or(config.engine_key),
        timeout_secs: config.timeout_secs,
    })?;
    tracing::info!("Routing against {}", engine.config().base_url);

    let rules = RoutingRules {
        safe_routing_enabled: config.safe_mode && !args.plain,
        max_alternatives: args.alternatives,
        ..RoutingRules::default()
    };

    let points = args
        .points
        .iter()
        .map(|p| parse_point(p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut query = Query::from_coordinates(&rules, args.profile.as_str(), &points);
    if let Some(path) = args.custom_model.as_ref() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading custom model {}", path.display()))?;
        query.set_custom_model(text);
        query.set_custom_model_enabled(true);
    }

    let coordinator = Coordinator::spawn(Arc::new(engine), rules);
    let snapshot = run_query(&coordinator, query, Duration::from_secs(args.wait)).await?;
    coordinator.shutdown().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_report(&snapshot);
    }
    Ok(())
}
