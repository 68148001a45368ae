//! Fleet registry
//!
//! Authoritative store of the latest reported state of every vehicle. One
//! reader/writer lock covers the whole fleet, so an idle scan never observes a
//! half-applied report and a claim cannot race another claim.

use chrono::{DateTime, Utc};
use convoy_core::{Coordinate, Route, VehicleId, VehicleState};
use convoy_transport::CoordinatorService;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

const CHANGE_FEED_CAPACITY: usize = 256;

/// One registry update: what was stored before and what is stored now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub previous: Option<VehicleState>,
    pub current: VehicleState,
}

/// A registry row as served to operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetEntry {
    pub state: VehicleState,
    pub last_seen: DateTime<Utc>,
}

#[derive(Default)]
struct Fleet {
    /// First-registration order; pins tie-breaks in nearest-idle lookups.
    order: Vec<VehicleId>,
    entries: HashMap<VehicleId, FleetEntry>,
}

impl Fleet {
    fn in_order(&self) -> impl Iterator<Item = &FleetEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    fn nearest_idle(&self, target: Coordinate) -> Option<&FleetEntry> {
        let mut best: Option<(&FleetEntry, u32)> = None;
        for entry in self.in_order().filter(|entry| entry.state.is_idle()) {
            let distance = entry.state.position.manhattan(&target);
            // Strict comparison keeps the earliest-registered vehicle on ties.
            if best.map_or(true, |(_, shortest)| distance < shortest) {
                best = Some((entry, distance));
            }
        }
        best.map(|(entry, _)| entry)
    }
}

pub struct FleetRegistry {
    fleet: RwLock<Fleet>,
    changes: broadcast::Sender<StateChange>,
}

impl std::fmt::Debug for FleetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetRegistry")
            .field("vehicles", &self.len())
            .field("subscribers", &self.changes.receiver_count())
            .finish()
    }
}

impl FleetRegistry {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            fleet: RwLock::new(Fleet::default()),
            changes,
        }
    }

    /// Receives every later [`StateChange`], in registry order.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Replaces the stored state for `state.id`, returning what was stored
    /// immediately before (`None` on first sighting).
    #[instrument(level = "debug", skip(self, state), fields(vehicle = %state.id, position = %state.position))]
    pub fn upsert(&self, state: VehicleState) -> Option<VehicleState> {
        let mut fleet = self.fleet.write();
        let entry = FleetEntry {
            state: state.clone(),
            last_seen: Utc::now(),
        };

        let previous = match fleet.entries.insert(state.id.clone(), entry) {
            Some(old) => Some(old.state),
            None => {
                info!(vehicle = %state.id, "vehicle joined the fleet");
                fleet.order.push(state.id.clone());
                None
            }
        };

        self.publish(previous.clone(), state);
        previous
    }

    /// Snapshot of every vehicle without a dispatched job.
    pub fn list_idle(&self) -> Vec<VehicleState> {
        self.fleet
            .read()
            .in_order()
            .filter(|entry| entry.state.is_idle())
            .map(|entry| entry.state.clone())
            .collect()
    }

    /// The idle vehicle closest to `target` by Manhattan distance. Ties go to
    /// the vehicle that first reported in.
    pub fn find_nearest_idle(&self, target: Coordinate) -> Option<VehicleState> {
        self.fleet
            .read()
            .nearest_idle(target)
            .map(|entry| entry.state.clone())
    }

    /// Selects the idle vehicle nearest to the start of `route` and commits it
    /// to that route in one step. No concurrent claim can pick the same vehicle.
    #[instrument(level = "debug", skip(self, route), fields(waypoints = route.len()))]
    pub fn claim_nearest_idle(&self, route: &Route) -> Option<VehicleState> {
        let target = route.first()?;
        let mut fleet = self.fleet.write();
        let id = fleet.nearest_idle(target)?.state.id.clone();
        let entry = fleet.entries.get_mut(&id)?;

        let previous = entry.state.clone();
        entry.state.active_route = true;
        entry.state.route = route.clone();
        let claimed = entry.state.clone();

        debug!(vehicle = %claimed.id, "vehicle claimed");
        self.publish(Some(previous), claimed.clone());
        Some(claimed)
    }

    pub fn get(&self, id: &str) -> Option<VehicleState> {
        self.fleet
            .read()
            .entries
            .get(id)
            .map(|entry| entry.state.clone())
    }

    pub fn list(&self) -> Vec<FleetEntry> {
        self.fleet.read().in_order().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.fleet.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish(&self, previous: Option<VehicleState>, current: VehicleState) {
        // No subscribers is fine; the feed is best-effort.
        let _ = self.changes.send(StateChange { previous, current });
    }
}

impl Default for FleetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorService for FleetRegistry {
    fn ingest(&self, state: VehicleState) {
        self.upsert(state);
    }
}
