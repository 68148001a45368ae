//! # Convoy Transport
//!
//! The three remote operations of the fleet, behind async traits:
//!
//! | Operation      | Direction             | Trait method                          |
//! |----------------|-----------------------|---------------------------------------|
//! | `ReportState`  | vehicle → coordinator | [`CoordinatorClient::report_state`]   |
//! | `PushRoute`    | coordinator → vehicle | [`VehicleClient::push_route`]         |
//! | `DescribeSelf` | vehicle → vehicle     | [`VehicleClient::describe`]           |
//!
//! [`http`] carries them as JSON over HTTP; [`memory`] wires services together
//! in-process for tests and single-process simulations.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use convoy_core::{Result, Route, VehicleState};
use serde::{Deserialize, Serialize};

pub use http::{url, HttpCoordinatorClient, HttpVehicleClient};
pub use memory::MemoryNetwork;

/// Client side of the coordinator's ingestion call.
#[async_trait]
pub trait CoordinatorClient: Send + Sync {
    async fn report_state(&self, state: &VehicleState) -> Result<()>;
}

/// Client side of the calls a vehicle serves.
#[async_trait]
pub trait VehicleClient: Send + Sync {
    /// Hands `route` to the vehicle at `address`, overwriting its current one.
    async fn push_route(&self, address: &str, route: &Route) -> Result<()>;

    /// Asks the vehicle at `address` for its current state.
    async fn describe(&self, address: &str) -> Result<VehicleState>;
}

/// Server side of the coordinator, as seen by in-process transports.
pub trait CoordinatorService: Send + Sync {
    fn ingest(&self, state: VehicleState);
}

/// Server side of a vehicle, as seen by in-process transports.
pub trait VehicleService: Send + Sync {
    fn describe_self(&self) -> VehicleState;
    fn accept_route(&self, route: Route) -> Result<()>;
}

/// Acknowledgement body returned by `ReportState` and `PushRoute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
