//! natprobe CLI
//!
//! Triggers a probe run against the echo servers and renders the merged
//! classification.

use clap::Parser;
use natprobe::{BehaviorDetector, Classification, ProbeConfig, ServerTopology};
use std::net::IpAddr;

/// Classify the local gateway's NAT filtering and port allocation behavior
#[derive(Parser)]
#[command(name = "natprobe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Number of concurrent probe rounds
    #[arg(short, long)]
    rounds: Option<usize>,

    /// Primary echo server (requires --secondary)
    #[arg(long, requires = "secondary")]
    primary: Option<IpAddr>,

    /// Secondary echo server (requires --primary)
    #[arg(long, requires = "primary")]
    secondary: Option<IpAddr>,

    /// Emit the classification as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose { "debug" } else { "info" })
        .init();

    let topology = match (cli.primary, cli.secondary) {
        (Some(primary), Some(secondary)) => ServerTopology::new(primary, secondary),
        _ => ServerTopology::default(),
    };

    let mut config = ProbeConfig::default();
    if let Some(rounds) = cli.rounds {
        config.rounds = rounds;
    }

    let detector = BehaviorDetector::new(topology, config)?;
    tracing::info!(
        filter_target = %detector.topology().filter_target,
        "probing NAT behavior"
    );
    let classification = detector.detect().await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&classification)?);
    } else {
        render(&classification);
    }

    Ok(())
}

/// Print the classification in the three-line layout: allocation,
/// progression, filtering.
fn render(classification: &Classification) {
    match &classification.mapping {
        Some(report) => {
            println!("Allocation:  {}", report.behavior);
            println!("Progression: {:+}", report.progression);
        }
        None => {
            println!("Allocation:  undetermined");
            println!("Progression: undetermined");
        }
    }
    match classification.filtering {
        Some(behavior) => println!("Filtering:   {behavior}"),
        None => println!("Filtering:   undetermined"),
    }
}
