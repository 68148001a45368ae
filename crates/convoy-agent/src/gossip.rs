//! Peer discovery and refresh
//!
//! Each vehicle keeps its own table of nearby vehicles, fed only by
//! point-to-point `DescribeSelf` calls. The table is read by the
//! cost-minimizing walk and never shared with the coordinator.

use convoy_core::{Coordinate, DiscoveryConfig, VehicleId, VehicleState};
use convoy_metrics::VehicleMetrics;
use convoy_transport::VehicleClient;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// A vehicle's stale-tolerant belief about another vehicle.
pub type PeerEntry = VehicleState;

/// Known peers keyed by the identifier they reported.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: DashMap<VehicleId, PeerEntry>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, peer: PeerEntry) -> Option<PeerEntry> {
        self.peers.insert(peer.id.clone(), peer)
    }

    pub fn remove(&self, id: &str) -> Option<PeerEntry> {
        self.peers.remove(id).map(|(_, peer)| peer)
    }

    pub fn get(&self, id: &str) -> Option<PeerEntry> {
        self.peers.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.peers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn ids(&self) -> Vec<VehicleId> {
        self.peers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Positions of every peer other than `own_id`, copied out of the table.
    pub fn positions_excluding(&self, own_id: &str) -> Vec<Coordinate> {
        self.peers
            .iter()
            .filter(|entry| entry.key() != own_id)
            .map(|entry| entry.value().position)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<PeerEntry> {
        self.peers.iter().map(|entry| entry.value().clone()).collect()
    }
}

pub struct PeerGossip {
    own_address: String,
    discovery: DiscoveryConfig,
    client: Arc<dyn VehicleClient>,
    peers: Arc<PeerTable>,
    metrics: Arc<VehicleMetrics>,
}

impl std::fmt::Debug for PeerGossip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerGossip")
            .field("own_address", &self.own_address)
            .field("discovery", &self.discovery)
            .field("peers", &self.peers.len())
            .finish()
    }
}

impl PeerGossip {
    pub fn new(
        own_address: impl Into<String>,
        discovery: DiscoveryConfig,
        client: Arc<dyn VehicleClient>,
        peers: Arc<PeerTable>,
        metrics: Arc<VehicleMetrics>,
    ) -> Self {
        Self {
            own_address: own_address.into(),
            discovery,
            client,
            peers,
            metrics,
        }
    }

    pub fn peers(&self) -> &Arc<PeerTable> {
        &self.peers
    }

    /// Probes every candidate address that is not already a known peer.
    /// Returns how many peers were added.
    #[instrument(skip(self), fields(vehicle = %self.own_address))]
    pub async fn discover(&self) -> usize {
        let mut found = 0;
        for address in self.discovery.candidates(&self.own_address) {
            if self.peers.contains(&address) {
                continue;
            }
            let Ok(peer) = self.client.describe(&address).await else {
                continue;
            };
            if peer.id == self.own_address {
                continue;
            }

            info!(%address, peer = %peer.id, position = %peer.position, "Found peer");
            self.metrics.peers_discovered.incr();
            self.peers.insert(peer);
            found += 1;
        }
        debug!(found, known = self.peers.len(), "discovery sweep done");
        found
    }

    /// Re-describes every known peer. One failed call evicts the peer.
    /// Returns how many peers were evicted.
    #[instrument(skip(self), fields(vehicle = %self.own_address))]
    pub async fn refresh(&self) -> usize {
        let mut evicted = 0;
        // Ids are copied out so no table lock is held across a call.
        for id in self.peers.ids() {
            match self.client.describe(&id).await {
                Ok(peer) => {
                    if peer.id != id {
                        self.peers.remove(&id);
                    }
                    self.peers.insert(peer);
                }
                Err(err) => {
                    warn!(peer = %id, %err, "Failed to refresh peer, evicting");
                    self.peers.remove(&id);
                    self.metrics.peers_evicted.incr();
                    evicted += 1;
                }
            }
        }
        evicted
    }

    pub async fn run_discovery(&self) {
        let mut ticker = tokio::time::interval(self.discovery.discovery_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.discover().await;
        }
    }

    pub async fn run_refresh(&self) {
        let mut ticker = tokio::time::interval(self.discovery.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.refresh().await;
        }
    }
}
