//! In-process transport
//!
//! Routes calls straight to registered service objects. Addresses can be cut
//! off to simulate a vehicle that stopped answering.

use crate::{CoordinatorClient, CoordinatorService, VehicleClient, VehicleService};
use async_trait::async_trait;
use convoy_core::{ConvoyError, Result, Route, VehicleState};
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct MemoryNetwork {
    coordinator: RwLock<Option<Arc<dyn CoordinatorService>>>,
    vehicles: DashMap<String, Arc<dyn VehicleService>>,
    unreachable: DashSet<String>,
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryNetwork")
            .field("has_coordinator", &self.coordinator.read().is_some())
            .field("vehicles", &self.vehicles.len())
            .field("unreachable", &self.unreachable.len())
            .finish()
    }
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attach_coordinator(&self, coordinator: Arc<dyn CoordinatorService>) {
        *self.coordinator.write() = Some(coordinator);
    }

    pub fn attach_vehicle(&self, address: impl Into<String>, vehicle: Arc<dyn VehicleService>) {
        self.vehicles.insert(address.into(), vehicle);
    }

    /// Every later call to `address` fails until [`MemoryNetwork::reconnect`].
    pub fn disconnect(&self, address: &str) {
        debug!(address, "disconnecting");
        self.unreachable.insert(address.to_string());
    }

    pub fn reconnect(&self, address: &str) {
        self.unreachable.remove(address);
    }

    fn vehicle(&self, address: &str) -> Result<Arc<dyn VehicleService>> {
        if self.unreachable.contains(address) {
            return Err(ConvoyError::transport(address, "connection refused"));
        }
        self.vehicles
            .get(address)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ConvoyError::transport(address, "no such host"))
    }
}

#[async_trait]
impl CoordinatorClient for MemoryNetwork {
    async fn report_state(&self, state: &VehicleState) -> Result<()> {
        let coordinator = self
            .coordinator
            .read()
            .clone()
            .ok_or_else(|| ConvoyError::transport("coordinator", "not attached"))?;
        coordinator.ingest(state.clone());
        Ok(())
    }
}

#[async_trait]
impl VehicleClient for MemoryNetwork {
    async fn push_route(&self, address: &str, route: &Route) -> Result<()> {
        self.vehicle(address)?.accept_route(route.clone())
    }

    async fn describe(&self, address: &str) -> Result<VehicleState> {
        Ok(self.vehicle(address)?.describe_self())
    }
}
