//! # Convoy Vehicle
//!
//! One autonomous vehicle of a Convoy fleet

use clap::Parser;
use convoy_agent::VehicleAgent;
use convoy_core::{Coordinate, DiscoveryConfig, GridConfig, IdleMode, VehicleConfig, BUILD_INFO};
use convoy_metrics::VehicleMetrics;
use convoy_transport::{HttpCoordinatorClient, HttpVehicleClient};
use convoy_vehicle::router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "convoy-vehicle")]
#[command(about = "Convoy Vehicle - Autonomous fleet member")]
#[command(version = convoy_core::VERSION)]
struct Args {
    /// Port to listen on; together with --host it is the vehicle's identity
    #[arg(long, default_value_t = 50001)]
    port: u16,

    /// Host name peers and the coordinator reach this vehicle under
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Start column
    #[arg(short, long, default_value_t = 3)]
    x: i32,

    /// Start row
    #[arg(short, long, default_value_t = 3)]
    y: i32,

    /// Display tag, usually a colour name
    #[arg(long, default_value = "Grün")]
    tag: String,

    /// Idle driving: random-walk or cost-minimizing
    #[arg(long, default_value = "random-walk")]
    idle_mode: IdleMode,

    /// Coordinator address
    #[arg(long, default_value = convoy_core::DEFAULT_COORDINATOR_ADDR)]
    coordinator: String,

    /// Edge length of the square grid
    #[arg(long, default_value_t = 8)]
    grid_size: i32,

    /// First port probed for peers
    #[arg(long, default_value_t = 50001)]
    first_peer_port: u16,

    /// Last port probed for peers
    #[arg(long, default_value_t = 50100)]
    last_peer_port: u16,

    /// Milliseconds between drive steps
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,

    /// Fixed seed for the random walk
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Starting Convoy Vehicle {}", BUILD_INFO);

    let defaults = VehicleConfig::default();
    let discovery = DiscoveryConfig {
        host: args.host.clone(),
        first_port: args.first_peer_port,
        last_port: args.last_peer_port,
        ..DiscoveryConfig::default()
    };
    let config = VehicleConfig {
        address: format!("{}:{}", args.host, args.port),
        start: Coordinate::new(args.x, args.y),
        tag: args.tag,
        idle_mode: args.idle_mode,
        grid: GridConfig {
            size: args.grid_size,
        },
        coordinator_address: args.coordinator,
        tick_interval: Duration::from_millis(args.tick_ms),
        discovery,
        ..defaults
    };

    let coordinator = Arc::new(HttpCoordinatorClient::new(
        config.coordinator_address.clone(),
        Duration::from_secs(2),
    )?);
    let peers = Arc::new(HttpVehicleClient::new(config.discovery.probe_timeout)?);
    let agent = VehicleAgent::new(config, coordinator, peers, Arc::new(VehicleMetrics::new()))?;
    let agent = Arc::new(match args.seed {
        Some(seed) => agent.with_seed(seed),
        None => agent,
    });

    // Serve before driving so peers and the coordinator can reach us at once.
    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!("Convoy Vehicle {} listening on {}", agent.id(), listener.local_addr()?);

    let driver = tokio::spawn(agent.clone().run());

    axum::serve(listener, router(agent))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    driver.abort();
    Ok(())
}
