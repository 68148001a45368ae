//! Vehicle agent
//!
//! Owns one vehicle's state and drives it on a fixed tick. The state lock and
//! the peer table lock are never held together, and neither is held across a
//! remote call.

use crate::drive::{cost_minimizing_step, random_step};
use crate::gossip::{PeerGossip, PeerTable};
use convoy_core::{
    ConvoyError, Coordinate, Direction, IdleMode, PathPlanner, Result, Route, VehicleConfig,
    VehicleState,
};
use convoy_metrics::VehicleMetrics;
use convoy_transport::{CoordinatorClient, VehicleClient, VehicleService};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Driving state of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriveMode {
    RandomWalk,
    CostMinimizing,
    RouteFollowing,
}

impl From<IdleMode> for DriveMode {
    fn from(mode: IdleMode) -> Self {
        match mode {
            IdleMode::RandomWalk => DriveMode::RandomWalk,
            IdleMode::CostMinimizing => DriveMode::CostMinimizing,
        }
    }
}

/// Everything guarded by the vehicle's state lock.
struct Vehicle {
    state: VehicleState,
    last_move: Option<Direction>,
    /// Set once the route is exhausted; `active_route` clears when it passes.
    settle_deadline: Option<Instant>,
    rng: StdRng,
}

impl Vehicle {
    fn mode(&self, idle: IdleMode) -> DriveMode {
        if self.state.active_route {
            DriveMode::RouteFollowing
        } else {
            idle.into()
        }
    }
}

pub struct VehicleAgent {
    vehicle: Mutex<Vehicle>,
    config: VehicleConfig,
    planner: PathPlanner,
    coordinator: Arc<dyn CoordinatorClient>,
    gossip: PeerGossip,
    metrics: Arc<VehicleMetrics>,
}

impl std::fmt::Debug for VehicleAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (position, mode) = {
            let vehicle = self.vehicle.lock();
            (vehicle.state.position, vehicle.mode(self.config.idle_mode))
        };
        f.debug_struct("VehicleAgent")
            .field("id", &self.config.address)
            .field("position", &position)
            .field("mode", &mode)
            .field("peers", &self.gossip.peers().len())
            .finish()
    }
}

impl VehicleAgent {
    pub fn new(
        config: VehicleConfig,
        coordinator: Arc<dyn CoordinatorClient>,
        peers_client: Arc<dyn VehicleClient>,
        metrics: Arc<VehicleMetrics>,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            vehicle = %config.address,
            start = %config.start,
            idle_mode = %config.idle_mode,
            "Initializing vehicle agent"
        );

        let gossip = PeerGossip::new(
            config.address.clone(),
            config.discovery.clone(),
            peers_client,
            Arc::new(PeerTable::new()),
            metrics.clone(),
        );
        let vehicle = Vehicle {
            state: VehicleState::new(config.address.clone(), config.start, config.tag.clone()),
            last_move: None,
            settle_deadline: None,
            rng: StdRng::from_os_rng(),
        };

        Ok(Self {
            vehicle: Mutex::new(vehicle),
            planner: PathPlanner::new(config.grid.size),
            config,
            coordinator,
            gossip,
            metrics,
        })
    }

    /// Replaces the random source, for reproducible walks.
    pub fn with_seed(self, seed: u64) -> Self {
        self.vehicle.lock().rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> &str {
        &self.config.address
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn state(&self) -> VehicleState {
        self.vehicle.lock().state.clone()
    }

    pub fn mode(&self) -> DriveMode {
        self.vehicle.lock().mode(self.config.idle_mode)
    }

    pub fn peers(&self) -> &Arc<PeerTable> {
        self.gossip.peers()
    }

    pub fn gossip(&self) -> &PeerGossip {
        &self.gossip
    }

    pub fn metrics(&self) -> &Arc<VehicleMetrics> {
        &self.metrics
    }

    /// Takes a dispatched route, overwriting any route in progress.
    ///
    /// When the vehicle is away from the first waypoint an approach leg is
    /// planned around the route's own cells and driven first.
    #[instrument(skip(self, route), fields(vehicle = %self.config.address, waypoints = route.len()))]
    pub fn accept_route(&self, route: Route) -> Result<()> {
        let Some(first) = route.first() else {
            return Err(ConvoyError::InvalidRoute {
                reason: "route has no waypoints".to_string(),
            });
        };
        let grid_size = self.config.grid.size;
        if let Some(outside) = route.iter().find(|cell| !cell.in_bounds(grid_size)) {
            return Err(ConvoyError::OutOfBounds {
                coordinate: *outside,
                grid_size,
            });
        }

        let mut vehicle = self.vehicle.lock();
        let position = vehicle.state.position;
        let mut itinerary = route;

        if position != first {
            let reserved: HashSet<_> = itinerary.iter().copied().collect();
            let approach = self
                .planner
                .find_path(position, first, &reserved)
                .or_else(|_| self.planner.plan(position, first))?;
            debug!(%approach, "Path to route start");
            let leg: Route = approach.iter().take(approach.len() - 1).copied().collect();
            itinerary.prepend(leg);
        }

        info!(route = %itinerary, "Received new route");
        vehicle.state.route = itinerary;
        vehicle.state.active_route = true;
        vehicle.settle_deadline = None;
        vehicle.last_move = None;
        self.metrics.routes_received.incr();
        Ok(())
    }

    /// Advances one drive step and reports the resulting state.
    pub async fn tick(&self) -> VehicleState {
        self.metrics.ticks.incr();

        let peers = match self.config.idle_mode {
            IdleMode::CostMinimizing => self.gossip.peers().positions_excluding(self.id()),
            IdleMode::RandomWalk => Vec::new(),
        };

        let snapshot = {
            let mut vehicle = self.vehicle.lock();
            self.advance(&mut vehicle, &peers, Instant::now());
            vehicle.state.clone()
        };

        debug!(position = %snapshot.position, active = snapshot.active_route, "Driving to new position");
        self.report(&snapshot).await;
        snapshot
    }

    fn advance(&self, vehicle: &mut Vehicle, peers: &[Coordinate], now: Instant) {
        let grid_size = self.config.grid.size;
        match vehicle.mode(self.config.idle_mode) {
            DriveMode::RouteFollowing => {
                let position = vehicle.state.position;
                vehicle.state.route.skip_while_at(position);

                if let Some(next) = vehicle.state.route.pop_front() {
                    vehicle.state.position = next;
                    if vehicle.state.route.is_empty() {
                        vehicle.settle_deadline = Some(now + self.config.settle_delay);
                    }
                    return;
                }

                let deadline = *vehicle
                    .settle_deadline
                    .get_or_insert(now + self.config.settle_delay);
                if now >= deadline {
                    info!(position = %vehicle.state.position, "Route completed, back to idle driving");
                    vehicle.state.active_route = false;
                    vehicle.settle_deadline = None;
                    self.metrics.routes_completed.incr();
                }
            }
            DriveMode::RandomWalk => {
                let position = vehicle.state.position;
                let last_move = vehicle.last_move;
                if let Some(direction) =
                    random_step(position, last_move, grid_size, &mut vehicle.rng)
                {
                    vehicle.state.position = position.step(direction);
                    vehicle.last_move = Some(direction);
                }
            }
            DriveMode::CostMinimizing => {
                vehicle.state.position = cost_minimizing_step(vehicle.state.position, peers, grid_size);
            }
        }
    }

    async fn report(&self, state: &VehicleState) {
        match self.coordinator.report_state(state).await {
            Ok(()) => self.metrics.reports_sent.incr(),
            Err(err) => {
                self.metrics.report_failures.incr();
                warn!(%err, "Error sending vehicle state");
            }
        }
    }

    /// Re-reports the current state without moving.
    pub async fn heartbeat(&self) {
        let snapshot = self.state();
        self.report(&snapshot).await;
    }

    async fn run_drive(&self) {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Announce the start position before the first move.
        ticker.tick().await;
        self.heartbeat().await;
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    async fn run_heartbeat(&self) {
        let mut ticker = tokio::time::interval(self.config.heartbeat_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.heartbeat().await;
        }
    }

    /// Runs the drive loop, heartbeat and both gossip loops until the task is
    /// dropped.
    pub async fn run(self: Arc<Self>) {
        info!(vehicle = %self.id(), "Starting vehicle");
        tokio::join!(
            self.run_drive(),
            self.run_heartbeat(),
            self.gossip.run_discovery(),
            self.gossip.run_refresh(),
        );
    }
}

impl VehicleService for VehicleAgent {
    fn describe_self(&self) -> VehicleState {
        self.state()
    }

    fn accept_route(&self, route: Route) -> Result<()> {
        VehicleAgent::accept_route(self, route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_core::GridConfig;
    use convoy_transport::{CoordinatorService, MemoryNetwork};
    use std::time::Duration;

    #[derive(Default)]
    struct Reports(Mutex<Vec<VehicleState>>);

    impl CoordinatorService for Reports {
        fn ingest(&self, state: VehicleState) {
            self.0.lock().push(state);
        }
    }

    fn c(x: i32, y: i32) -> Coordinate {
        Coordinate::new(x, y)
    }

    fn agent(start: Coordinate, idle_mode: IdleMode) -> (Arc<VehicleAgent>, Arc<MemoryNetwork>, Arc<Reports>) {
        let network = MemoryNetwork::new();
        let reports = Arc::new(Reports::default());
        network.attach_coordinator(reports.clone());
        let config = VehicleConfig {
            address: "localhost:50001".to_string(),
            start,
            idle_mode,
            grid: GridConfig { size: 8 },
            settle_delay: Duration::from_secs(1),
            ..VehicleConfig::default()
        };
        let agent = VehicleAgent::new(
            config,
            network.clone(),
            network.clone(),
            Arc::new(VehicleMetrics::new()),
        )
        .unwrap()
        .with_seed(42);
        let agent = Arc::new(agent);
        network.attach_vehicle("localhost:50001", agent.clone());
        (agent, network, reports)
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_followed_then_settles() {
        let (agent, _network, reports) = agent(c(0, 0), IdleMode::RandomWalk);
        let route = Route::from(vec![c(0, 0), c(0, 1), c(0, 2), c(0, 3)]);
        agent.accept_route(route).unwrap();
        assert_eq!(agent.mode(), DriveMode::RouteFollowing);

        for _ in 0..3 {
            agent.tick().await;
        }
        let state = agent.state();
        assert_eq!(state.position, c(0, 3));
        assert!(state.active_route);
        assert!(state.route.is_empty());

        // Inside the settle window the vehicle holds position.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(agent.tick().await.active_route);
        assert_eq!(agent.state().position, c(0, 3));

        tokio::time::advance(Duration::from_millis(600)).await;
        let settled = agent.tick().await;
        assert!(!settled.active_route);
        assert_eq!(settled.position, c(0, 3));
        assert_eq!(agent.mode(), DriveMode::RandomWalk);
        assert_eq!(reports.0.lock().len(), 5);
    }

    #[tokio::test]
    async fn test_approach_leg_driven_before_route() {
        let (agent, _network, _) = agent(c(0, 0), IdleMode::RandomWalk);
        agent
            .accept_route(Route::from(vec![c(2, 0), c(2, 1)]))
            .unwrap();

        let visited: Vec<_> = [
            agent.tick().await.position,
            agent.tick().await.position,
            agent.tick().await.position,
        ]
        .into();
        assert_eq!(visited, vec![c(1, 0), c(2, 0), c(2, 1)]);
    }

    #[tokio::test]
    async fn test_new_route_overwrites_current() {
        let (agent, _network, _) = agent(c(0, 0), IdleMode::RandomWalk);
        agent
            .accept_route(Route::from(vec![c(0, 0), c(0, 1), c(0, 2), c(0, 3)]))
            .unwrap();
        agent.tick().await;

        agent
            .accept_route(Route::from(vec![c(0, 1), c(1, 1)]))
            .unwrap();
        assert_eq!(agent.tick().await.position, c(1, 1));
        assert!(agent.state().route.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_empty_and_off_grid_routes() {
        let (agent, _network, _) = agent(c(0, 0), IdleMode::RandomWalk);
        assert!(matches!(
            agent.accept_route(Route::new()),
            Err(ConvoyError::InvalidRoute { .. })
        ));
        assert!(matches!(
            agent.accept_route(Route::from(vec![c(0, 0), c(0, 8)])),
            Err(ConvoyError::OutOfBounds { .. })
        ));
        assert!(!agent.state().active_route);
    }

    #[tokio::test]
    async fn test_random_walk_moves_one_cell_on_grid() {
        let (agent, _network, _) = agent(c(0, 0), IdleMode::RandomWalk);
        let mut previous = agent.state().position;
        for _ in 0..100 {
            let position = agent.tick().await.position;
            assert!(position.in_bounds(8));
            assert_eq!(position.manhattan(&previous), 1);
            previous = position;
        }
    }

    #[tokio::test]
    async fn test_cost_minimizing_uses_peer_table() {
        let (agent, _network, _) = agent(c(3, 3), IdleMode::CostMinimizing);
        agent.peers().insert(VehicleState::new("a", c(3, 5), ""));
        agent.peers().insert(VehicleState::new("b", c(1, 3), ""));
        assert_eq!(agent.tick().await.position, c(3, 2));
    }

    struct Parked(VehicleState);

    impl VehicleService for Parked {
        fn describe_self(&self) -> VehicleState {
            self.0.clone()
        }

        fn accept_route(&self, _route: Route) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_heartbeats_and_gossips_without_moving() {
        let network = MemoryNetwork::new();
        let reports = Arc::new(Reports::default());
        network.attach_coordinator(reports.clone());
        network.attach_vehicle(
            "localhost:50002",
            Arc::new(Parked(VehicleState::new("localhost:50002", c(6, 6), ""))),
        );
        let config = VehicleConfig {
            address: "localhost:50001".to_string(),
            start: c(2, 2),
            tick_interval: Duration::from_secs(3600),
            ..VehicleConfig::default()
        };
        let agent = Arc::new(
            VehicleAgent::new(
                config,
                network.clone(),
                network.clone(),
                Arc::new(VehicleMetrics::new()),
            )
            .unwrap(),
        );
        let task = tokio::spawn(agent.clone().run());

        // Start announcement plus heartbeats at 5s, 10s and 15s; the hour-long
        // drive tick never fires.
        tokio::time::sleep(Duration::from_millis(15_500)).await;
        {
            let reports = reports.0.lock();
            assert_eq!(reports.len(), 4);
            assert!(reports.iter().all(|state| state.position == c(2, 2)));
        }
        assert_eq!(agent.metrics().snapshot().ticks, 0);
        assert_eq!(agent.peers().ids(), vec!["localhost:50002".to_string()]);

        network.disconnect("localhost:50002");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(agent.peers().is_empty());
        assert_eq!(agent.metrics().snapshot().peers_evicted, 1);

        task.abort();
    }

    #[tokio::test]
    async fn test_debug_shows_position_mode_and_peer_count() {
        let (agent, _network, _) = agent(c(1, 2), IdleMode::CostMinimizing);
        agent
            .peers()
            .insert(VehicleState::new("localhost:50002", c(4, 4), ""));

        let rendered = format!("{agent:?}");
        assert!(rendered.contains("\"localhost:50001\""), "{rendered}");
        assert!(rendered.contains("CostMinimizing"), "{rendered}");
        assert!(rendered.contains("peers: 1"), "{rendered}");
        // The vehicle lock is free again once formatting returns.
        assert_eq!(agent.state().position, c(1, 2));
    }

    #[tokio::test]
    async fn test_report_failure_is_not_fatal() {
        let network = MemoryNetwork::new();
        let agent = VehicleAgent::new(
            VehicleConfig::default(),
            network.clone(),
            network,
            Arc::new(VehicleMetrics::new()),
        )
        .unwrap();

        agent.tick().await;
        agent.tick().await;
        assert_eq!(agent.metrics().snapshot().report_failures, 2);
    }
}
