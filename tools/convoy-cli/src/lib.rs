//! Command handling for the `convoy` tool. Every command renders its output
//! into a string so it can be printed or inspected.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use convoy_core::{
    endpoints, Coordinate, PathPlanner, Route, VehicleState, DEFAULT_COORDINATOR_ADDR,
};
use convoy_dispatch::FleetEntry;
use convoy_transport::{url, HttpVehicleClient, VehicleClient};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "convoy")]
#[command(about = "Convoy CLI - Fleet inspection and manual dispatch")]
#[command(version = convoy_core::VERSION)]
pub struct Cli {
    /// Coordinator address
    #[arg(long, global = true, default_value = DEFAULT_COORDINATOR_ADDR)]
    pub coordinator: String,

    /// Seconds before a request is given up
    #[arg(long, global = true, default_value_t = 5)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fleet inspection commands
    Fleet {
        #[command(subcommand)]
        action: FleetAction,
    },
    /// Print the coordinator's grid view
    Grid,
    /// Plan a path locally, without contacting any service
    Plan {
        #[arg(value_parser = parse_cell)]
        from: Coordinate,
        #[arg(value_parser = parse_cell)]
        to: Coordinate,
        /// Edge length of the square grid
        #[arg(long, default_value_t = 8)]
        grid_size: i32,
        /// Cell to route around; repeat for more
        #[arg(long, value_parser = parse_cell)]
        avoid: Vec<Coordinate>,
    },
    /// Single vehicle commands
    Vehicle {
        #[command(subcommand)]
        action: VehicleAction,
    },
    /// Ask the coordinator to plan and dispatch a delivery now
    Dispatch {
        /// Pickup cell; drawn at random together with --to when omitted
        #[arg(long, value_parser = parse_cell, requires = "to")]
        from: Option<Coordinate>,
        /// Drop-off cell
        #[arg(long, value_parser = parse_cell, requires = "from")]
        to: Option<Coordinate>,
    },
    /// Coordinator health and counters
    Status,
}

#[derive(Subcommand, Debug)]
pub enum FleetAction {
    /// List every known vehicle
    List,
    /// List vehicles without a dispatched job
    Idle,
}

#[derive(Subcommand, Debug)]
pub enum VehicleAction {
    /// Show what a vehicle reports about itself
    Show { address: String },
    /// Push a route straight to a vehicle, bypassing the dispatcher
    Push {
        address: String,
        #[arg(value_parser = parse_cell, required = true)]
        cells: Vec<Coordinate>,
    },
}

/// Parses a cell written as `x,y`.
pub fn parse_cell(s: &str) -> Result<Coordinate, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("'{s}' is not a cell, expected x,y"))?;
    let x = x.trim().parse().map_err(|_| format!("bad x in '{s}'"))?;
    let y = y.trim().parse().map_err(|_| format!("bad y in '{s}'"))?;
    Ok(Coordinate::new(x, y))
}

/// One line per vehicle: identity, position, job status and tag.
pub fn render_fleet(entries: &[FleetEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "🚗 {} vehicle(s)", entries.len());
    for entry in entries {
        let _ = writeln!(out, "{}", render_vehicle(&entry.state));
    }
    out
}

pub fn render_vehicle(state: &VehicleState) -> String {
    let status = if state.active_route {
        format!("on route, {} waypoint(s) left", state.route.len())
    } else {
        "idle".to_string()
    };
    format!(
        "{:<20} {:<8} {:<32} {}",
        state.id,
        state.position.to_string(),
        status,
        state.tag
    )
}

/// Plans a path on a local planner and renders it with its step count.
pub fn plan_locally(
    from: Coordinate,
    to: Coordinate,
    grid_size: i32,
    avoid: &[Coordinate],
) -> anyhow::Result<String> {
    let avoid: HashSet<Coordinate> = avoid.iter().copied().collect();
    let route = PathPlanner::new(grid_size).find_path(from, to, &avoid)?;
    Ok(format!("🧭 {} step(s): {}\n", route.len() - 1, route))
}

pub async fn execute(cli: Cli) -> anyhow::Result<String> {
    let timeout = Duration::from_secs(cli.timeout_secs);
    let http = reqwest::Client::builder().timeout(timeout).build()?;
    let coordinator = cli.coordinator.as_str();

    match cli.command {
        Commands::Fleet { action } => {
            let body: Value = get_json(&http, coordinator, endpoints::API_V1_VEHICLES).await?;
            let mut entries: Vec<FleetEntry> = serde_json::from_value(body["vehicles"].clone())
                .context("coordinator returned an unexpected fleet list")?;
            if matches!(action, FleetAction::Idle) {
                entries.retain(|entry| entry.state.is_idle());
            }
            Ok(render_fleet(&entries))
        }
        Commands::Grid => {
            let text = http
                .get(url(coordinator, endpoints::API_V1_GRID))
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            Ok(text)
        }
        Commands::Plan {
            from,
            to,
            grid_size,
            avoid,
        } => plan_locally(from, to, grid_size, &avoid),
        Commands::Vehicle { action } => {
            let vehicles = HttpVehicleClient::new(timeout)?;
            match action {
                VehicleAction::Show { address } => {
                    let state = vehicles.describe(&address).await?;
                    Ok(format!("🔍 {}\n", render_vehicle(&state)))
                }
                VehicleAction::Push { address, cells } => {
                    let route = Route::from(cells);
                    vehicles.push_route(&address, &route).await?;
                    Ok(format!("🚀 Pushed {route} to {address}\n"))
                }
            }
        }
        Commands::Dispatch { from, to } => {
            let request = match (from, to) {
                (Some(start), Some(end)) => json!({ "start": start, "end": end }),
                (None, None) => json!({}),
                _ => bail!("--from and --to go together"),
            };
            let response: Value = http
                .post(url(coordinator, endpoints::API_V1_ROUTES))
                .json(&request)
                .send()
                .await?
                .error_for_status()
                .context("coordinator refused the delivery")?
                .json()
                .await?;
            let route: Route = serde_json::from_value(response["route"].clone())
                .context("coordinator returned no route")?;
            Ok(format!("📦 Delivery queued: {route}\n"))
        }
        Commands::Status => {
            let health: Value = get_json(&http, coordinator, endpoints::HEALTH).await?;
            let metrics: Value = get_json(&http, coordinator, endpoints::METRICS).await?;
            let mut out = String::new();
            let _ = writeln!(out, "📊 Convoy Coordinator Status");
            let _ = writeln!(
                out,
                "🎯 {} (version {})",
                health["status"].as_str().unwrap_or("unknown"),
                health["version"].as_str().unwrap_or("?")
            );
            let _ = writeln!(
                out,
                "🚗 {} vehicle(s), {} idle",
                metrics["vehicles"], metrics["idle_vehicles"]
            );
            let _ = writeln!(out, "{}", serde_json::to_string_pretty(&metrics["dispatch"])?);
            Ok(out)
        }
    }
}

async fn get_json(http: &reqwest::Client, address: &str, path: &str) -> anyhow::Result<Value> {
    let value = http
        .get(url(address, path))
        .send()
        .await
        .with_context(|| format!("coordinator at {address} is not reachable"))?
        .error_for_status()?
        .json()
        .await?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("3,4"), Ok(Coordinate::new(3, 4)));
        assert_eq!(parse_cell(" 0 , 7 "), Ok(Coordinate::new(0, 7)));
        assert!(parse_cell("3").is_err());
        assert!(parse_cell("a,1").is_err());
    }

    #[test]
    fn test_cli_parses_push() {
        let cli = Cli::try_parse_from(["convoy", "vehicle", "push", "localhost:50002", "0,0", "0,1"])
            .unwrap();
        match cli.command {
            Commands::Vehicle {
                action: VehicleAction::Push { address, cells },
            } => {
                assert_eq!(address, "localhost:50002");
                assert_eq!(cells, vec![Coordinate::new(0, 0), Coordinate::new(0, 1)]);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.coordinator, DEFAULT_COORDINATOR_ADDR);
    }

    #[test]
    fn test_dispatch_needs_both_ends() {
        assert!(Cli::try_parse_from(["convoy", "dispatch", "--from", "1,1"]).is_err());
        assert!(Cli::try_parse_from(["convoy", "dispatch"]).is_ok());
    }

    #[test]
    fn test_render_vehicle_status() {
        let mut state = VehicleState::new("localhost:50001", Coordinate::new(1, 2), "Rot");
        assert!(render_vehicle(&state).contains("idle"));
        state.active_route = true;
        state.route = Route::from(vec![Coordinate::new(1, 3)]);
        assert!(render_vehicle(&state).contains("1 waypoint(s) left"));
    }
}
