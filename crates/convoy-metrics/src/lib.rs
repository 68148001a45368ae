//! Lock-free counters for the Convoy services
//!
//! Counters are bumped from the hot paths (drive ticks, report ingestion,
//! dispatch retries) and read as a serializable snapshot by `/metrics`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::trace;

/// Monotonic event counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Coordinator-side counters.
#[derive(Debug)]
pub struct DispatchMetrics {
    started_at: Instant,
    pub routes_generated: Counter,
    pub planning_failures: Counter,
    pub routes_assigned: Counter,
    pub assignment_stalls: Counter,
    pub push_failures: Counter,
    pub reports_received: Counter,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            routes_generated: Counter::default(),
            planning_failures: Counter::default(),
            routes_assigned: Counter::default(),
            assignment_stalls: Counter::default(),
            push_failures: Counter::default(),
            reports_received: Counter::default(),
        }
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        trace!("taking dispatch metrics snapshot");
        DispatchSnapshot {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            routes_generated: self.routes_generated.get(),
            planning_failures: self.planning_failures.get(),
            routes_assigned: self.routes_assigned.get(),
            assignment_stalls: self.assignment_stalls.get(),
            push_failures: self.push_failures.get(),
            reports_received: self.reports_received.get(),
        }
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    pub uptime_seconds: u64,
    pub routes_generated: u64,
    pub planning_failures: u64,
    pub routes_assigned: u64,
    pub assignment_stalls: u64,
    pub push_failures: u64,
    pub reports_received: u64,
}

/// Per-vehicle counters.
#[derive(Debug)]
pub struct VehicleMetrics {
    started_at: Instant,
    pub ticks: Counter,
    pub reports_sent: Counter,
    pub report_failures: Counter,
    pub routes_received: Counter,
    pub routes_completed: Counter,
    pub peers_discovered: Counter,
    pub peers_evicted: Counter,
}

impl VehicleMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            ticks: Counter::default(),
            reports_sent: Counter::default(),
            report_failures: Counter::default(),
            routes_received: Counter::default(),
            routes_completed: Counter::default(),
            peers_discovered: Counter::default(),
            peers_evicted: Counter::default(),
        }
    }

    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            ticks: self.ticks.get(),
            reports_sent: self.reports_sent.get(),
            report_failures: self.report_failures.get(),
            routes_received: self.routes_received.get(),
            routes_completed: self.routes_completed.get(),
            peers_discovered: self.peers_discovered.get(),
            peers_evicted: self.peers_evicted.get(),
        }
    }
}

impl Default for VehicleMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub uptime_seconds: u64,
    pub ticks: u64,
    pub reports_sent: u64,
    pub report_failures: u64,
    pub routes_received: u64,
    pub routes_completed: u64,
    pub peers_discovered: u64,
    pub peers_evicted: u64,
}
