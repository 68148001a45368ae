//! Route dispatcher
//!
//! Synthesizes delivery jobs and gets each one executed by exactly one
//! vehicle. Assignment waits as long as it takes for some vehicle to become
//! idle; there is no backlog beyond the jobs already in flight and no timeout.

use crate::registry::FleetRegistry;
use convoy_core::{
    ConvoyError, Coordinate, DispatchConfig, PathPlanner, Result, Route, VehicleState,
};
use convoy_metrics::DispatchMetrics;
use convoy_transport::VehicleClient;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct Dispatcher {
    registry: Arc<FleetRegistry>,
    vehicles: Arc<dyn VehicleClient>,
    planner: PathPlanner,
    config: DispatchConfig,
    metrics: Arc<DispatchMetrics>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        registry: Arc<FleetRegistry>,
        vehicles: Arc<dyn VehicleClient>,
        config: DispatchConfig,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        info!(grid = config.grid.size, "Initializing Convoy dispatcher");
        Self {
            registry,
            vehicles,
            planner: PathPlanner::new(config.grid.size),
            config,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<FleetRegistry> {
        &self.registry
    }

    /// Plans a job between two given cells without avoidance.
    pub fn plan_job(&self, start: Coordinate, end: Coordinate) -> Result<Route> {
        let route = self.planner.plan(start, end).inspect_err(|_| {
            self.metrics.planning_failures.incr();
        })?;
        self.metrics.routes_generated.incr();
        Ok(route)
    }

    /// Plans a job between two uniformly drawn cells.
    pub fn generate_route<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Route> {
        let size = self.config.grid.size;
        if size <= 0 {
            return Err(ConvoyError::InvalidConfig {
                reason: format!("grid size {size} has no cells to draw from"),
            });
        }
        let start = Coordinate::new(rng.random_range(0..size), rng.random_range(0..size));
        let end = Coordinate::new(rng.random_range(0..size), rng.random_range(0..size));
        let route = self.plan_job(start, end)?;
        info!(%start, %end, %route, "Generated random route");
        Ok(route)
    }

    /// Commits `route` to the nearest idle vehicle and pushes it there.
    ///
    /// Retries every `retry_backoff` until a vehicle is free. Returns the
    /// claimed vehicle, or `None` for an empty route. A failed push is
    /// returned as an error and the claimed vehicle stays marked active; the
    /// job is not offered to anyone else.
    #[instrument(skip(self, route), fields(waypoints = route.len()))]
    pub async fn assign_route(&self, route: Route) -> Result<Option<VehicleState>> {
        if route.is_empty() {
            debug!("empty route, nothing to assign");
            return Ok(None);
        }

        let vehicle = loop {
            if let Some(vehicle) = self.registry.claim_nearest_idle(&route) {
                break vehicle;
            }
            self.metrics.assignment_stalls.incr();
            info!(
                backoff_ms = self.config.retry_backoff.as_millis() as u64,
                "No free vehicle found, waiting"
            );
            tokio::time::sleep(self.config.retry_backoff).await;
        };

        info!(vehicle = %vehicle.id, "Nearest idle vehicle claimed");
        if let Err(err) = self.vehicles.push_route(&vehicle.id, &route).await {
            self.metrics.push_failures.incr();
            error!(vehicle = %vehicle.id, %err, "Failed to send route to vehicle; job dropped");
            return Err(err);
        }

        self.metrics.routes_assigned.incr();
        Ok(Some(vehicle))
    }

    /// Generates a job every `generate_interval` and assigns each on its own
    /// task, so a stalled assignment never delays the next job.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.generate_interval);
        // The first tick of an interval completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let generated = self.generate_route(&mut rand::rng());
            match generated {
                Ok(route) => {
                    let dispatcher = self.clone();
                    tokio::spawn(async move {
                        if let Err(err) = dispatcher.assign_route(route).await {
                            error!(%err, "Generated route was not delivered");
                        }
                    });
                }
                Err(err) => warn!(%err, "No route produced this cycle"),
            }
        }
    }
}
