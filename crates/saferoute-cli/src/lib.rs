//! SafeRoute CLI - command line tools for the routing coordinator.
//!
//! Binaries:
//! - route_query: route against a live GraphHopper instance
//! - simulate_query: route against the built-in simulated engine

pub mod config;
pub mod runner;

pub use config::Config;
pub use runner::{parse_point, print_report, run_query};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` plus the given default directives.
pub fn env_filter(directives: &[&str]) -> anyhow::Result<EnvFilter> {
    let mut filter = EnvFilter::from_default_env();
    for directive in directives {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

/// Install the fmt subscriber on stderr. Pass one directive per target, the
/// library crates and the binary's own crate name.
pub fn init_tracing(directives: &[&str]) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(directives)?)
        .try_init()?;
    Ok(())
}
