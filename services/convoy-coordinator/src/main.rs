//! # Convoy Coordinator
//!
//! Fleet registry and route dispatch service

use clap::Parser;
use convoy_coordinator::{router, CoordinatorState, GridView};
use convoy_core::{DispatchConfig, GridConfig, BUILD_INFO};
use convoy_dispatch::{Dispatcher, FleetRegistry};
use convoy_metrics::DispatchMetrics;
use convoy_transport::HttpVehicleClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "convoy-coordinator")]
#[command(about = "Convoy Coordinator - Fleet registry and route dispatch")]
#[command(version = convoy_core::VERSION)]
struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = 50051)]
    port: u16,

    /// Edge length of the square grid
    #[arg(long, default_value_t = 8)]
    grid_size: i32,

    /// Seconds between generated routes
    #[arg(long, default_value_t = 10)]
    generate_interval_secs: u64,

    /// Milliseconds to wait when no vehicle is free
    #[arg(long, default_value_t = 1000)]
    retry_backoff_ms: u64,

    /// Milliseconds before a route push is given up
    #[arg(long, default_value_t = 2000)]
    push_timeout_ms: u64,

    /// Only dispatch routes requested over the API
    #[arg(long)]
    no_generate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!("Starting Convoy Coordinator {}", BUILD_INFO);

    let config = DispatchConfig {
        grid: GridConfig {
            size: args.grid_size,
        },
        generate_interval: Duration::from_secs(args.generate_interval_secs),
        retry_backoff: Duration::from_millis(args.retry_backoff_ms),
    };
    config.validate()?;

    let registry = Arc::new(FleetRegistry::new());
    let metrics = Arc::new(DispatchMetrics::new());
    let vehicles = Arc::new(HttpVehicleClient::new(Duration::from_millis(
        args.push_timeout_ms,
    ))?);
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        vehicles,
        config.clone(),
        metrics.clone(),
    ));
    let grid = Arc::new(GridView::new(config.grid.size));

    {
        let grid = grid.clone();
        let changes = registry.subscribe();
        tokio::spawn(async move { grid.follow(changes).await });
    }
    if args.no_generate {
        warn!("Route generation disabled, dispatching on request only");
    } else {
        tokio::spawn(dispatcher.clone().run());
    }

    let app = router(CoordinatorState {
        registry,
        dispatcher,
        grid,
        metrics,
    });

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!("Convoy Coordinator listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
