//! JSON-over-HTTP transport

use crate::{Ack, CoordinatorClient, VehicleClient};
use async_trait::async_trait;
use convoy_core::{endpoints, ConvoyError, Result, Route, VehicleState};
use std::time::Duration;
use tracing::{debug, instrument};

/// Full URL of `path` on the service at `address`; bare `host:port` means plain HTTP.
pub fn url(address: &str, path: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        format!("{address}{path}")
    } else {
        format!("http://{address}{path}")
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConvoyError::InvalidConfig {
            reason: format!("http client: {e}"),
        })
}

/// Reports vehicle state to one coordinator.
#[derive(Debug, Clone)]
pub struct HttpCoordinatorClient {
    client: reqwest::Client,
    address: String,
}

impl HttpCoordinatorClient {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            address: address.into(),
        })
    }
}

#[async_trait]
impl CoordinatorClient for HttpCoordinatorClient {
    #[instrument(level = "debug", skip(self, state), fields(vehicle = %state.id))]
    async fn report_state(&self, state: &VehicleState) -> Result<()> {
        let ack: Ack = self
            .client
            .post(url(&self.address, endpoints::API_V1_VEHICLE_STATE))
            .json(state)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ConvoyError::transport(&self.address, e))?
            .json()
            .await
            .map_err(|e| ConvoyError::transport(&self.address, e))?;

        debug!(message = %ack.message, "state reported");
        Ok(())
    }
}

/// Calls vehicles by address.
#[derive(Debug, Clone)]
pub struct HttpVehicleClient {
    client: reqwest::Client,
}

impl HttpVehicleClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl VehicleClient for HttpVehicleClient {
    #[instrument(level = "debug", skip(self, route), fields(waypoints = route.len()))]
    async fn push_route(&self, address: &str, route: &Route) -> Result<()> {
        let ack: Ack = self
            .client
            .post(url(address, endpoints::API_V1_ROUTE))
            .json(route)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ConvoyError::transport(address, e))?
            .json()
            .await
            .map_err(|e| ConvoyError::transport(address, e))?;

        debug!(message = %ack.message, "route pushed");
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn describe(&self, address: &str) -> Result<VehicleState> {
        let body = self
            .client
            .get(url(address, endpoints::API_V1_STATE))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ConvoyError::transport(address, e))?
            .text()
            .await
            .map_err(|e| ConvoyError::transport(address, e))?;

        // A peer that answers with garbage is reachable but not a vehicle.
        Ok(serde_json::from_str(&body)?)
    }
}
