//! # Convoy Core
//!
//! Core types shared by every Convoy component: the grid model, the
//! breadth-first path planner, configuration and the error taxonomy.
//!
//! ## Coordinator
//! - Owns the fleet-wide view of every vehicle and dispatches delivery routes
//! - Plans routes on the grid without avoidance
//!
//! ## Vehicles
//! - Drive on a fixed tick, either following a route or wandering idle
//! - Discover nearby peers and steer away from crowded cells

pub mod config;
pub mod error;
pub mod model;
pub mod planner;

pub use config::{
    DiscoveryConfig, DispatchConfig, GridConfig, IdleMode, VehicleConfig, DEFAULT_COORDINATOR_ADDR,
};
pub use error::{ConvoyError, Result};
pub use model::{Coordinate, Direction, Route, VehicleId, VehicleState};
pub use planner::PathPlanner;

/// Current Convoy version for compatibility checks
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convoy build information for logs and health endpoints
pub const BUILD_INFO: &str = concat!(
    "Convoy ",
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CARGO_PKG_NAME"),
    ")"
);

/// Standard API endpoints for Convoy services
pub mod endpoints {
    pub const HEALTH: &str = "/health";
    pub const METRICS: &str = "/metrics";

    // Coordinator
    pub const API_V1_VEHICLES: &str = "/api/v1/vehicles";
    pub const API_V1_VEHICLE_STATE: &str = "/api/v1/vehicles/state";
    pub const API_V1_ROUTES: &str = "/api/v1/routes";
    pub const API_V1_GRID: &str = "/api/v1/grid";

    // Vehicle
    pub const API_V1_ROUTE: &str = "/api/v1/route";
    pub const API_V1_STATE: &str = "/api/v1/state";
}
