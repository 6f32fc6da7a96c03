//! Connects to a cluster, prints what it found, and round-trips one key.
//!
//! Usage: `cluster-probe [seed,seed,...] [key]`

use anyhow::{Context, Result};
use slotline_client::{ClusterClient, ClusterConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let mut config = ClusterConfig::default();
    if let Some(seeds) = args.next() {
        config.seeds = seeds.split(',').map(str::to_string).collect();
    }
    let key = args.next().unwrap_or_else(|| "slotline:probe".to_string());

    println!(
        "{} {} - seeds: {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.seeds.join(",")
    );

    let client = ClusterClient::new(config).context("failed to build cluster client")?;
    let mut nodes: Vec<String> = client.cache().nodes().into_iter().map(|(name, _)| name).collect();
    nodes.sort();
    tracing::info!(
        nodes = nodes.len(),
        mapped_slots = client.cache().mapped_slots(),
        "topology loaded"
    );
    for node in &nodes {
        println!("node {node}");
    }

    let pong = client
        .run(key.as_bytes(), |conn| conn.ping())
        .context("ping failed")?;
    println!("ping {}", String::from_utf8_lossy(&pong));

    match client.get(key.as_bytes()).context("get failed")? {
        Some(value) => println!("get {key} = {}", String::from_utf8_lossy(&value)),
        None => println!("get {key} = (nil)"),
    }

    client.close();
    Ok(())
}
