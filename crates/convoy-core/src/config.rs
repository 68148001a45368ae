//! Configuration supplied by the service binaries
//!
//! Defaults carry the reference timer periods; binaries override them from
//! their command line.

use crate::error::{ConvoyError, Result};
use crate::model::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_COORDINATOR_ADDR: &str = "localhost:50051";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    pub size: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { size: 8 }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        if self.size < 1 {
            return Err(ConvoyError::InvalidConfig {
                reason: format!("grid size must be positive, got {}", self.size),
            });
        }
        Ok(())
    }
}

/// What a vehicle does while it has no dispatched job. Fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdleMode {
    #[default]
    RandomWalk,
    CostMinimizing,
}

impl fmt::Display for IdleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdleMode::RandomWalk => f.write_str("random-walk"),
            IdleMode::CostMinimizing => f.write_str("cost-minimizing"),
        }
    }
}

impl FromStr for IdleMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "random-walk" | "random" => Ok(IdleMode::RandomWalk),
            "cost-minimizing" | "advanced" => Ok(IdleMode::CostMinimizing),
            other => Err(format!(
                "unknown idle mode '{other}', expected 'random-walk' or 'cost-minimizing'"
            )),
        }
    }
}

/// Candidate peer addresses probed during discovery: `host:first_port..=last_port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub host: String,
    pub first_port: u16,
    pub last_port: u16,
    pub discovery_interval: Duration,
    pub refresh_interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            first_port: 50001,
            last_port: 50100,
            discovery_interval: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(5),
            probe_timeout: Duration::from_millis(500),
        }
    }
}

impl DiscoveryConfig {
    /// Candidate addresses in port order, excluding `own_address`.
    pub fn candidates(&self, own_address: &str) -> Vec<String> {
        (self.first_port..=self.last_port)
            .map(|port| format!("{}:{}", self.host, port))
            .filter(|address| address != own_address)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleConfig {
    /// Identifier and reachable `host:port` address of this vehicle.
    pub address: String,
    pub start: Coordinate,
    pub tag: String,
    pub idle_mode: IdleMode,
    pub grid: GridConfig,
    pub coordinator_address: String,
    pub tick_interval: Duration,
    pub heartbeat_interval: Duration,
    pub settle_delay: Duration,
    pub discovery: DiscoveryConfig,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            address: "localhost:50001".to_string(),
            start: Coordinate::new(3, 3),
            tag: String::new(),
            idle_mode: IdleMode::default(),
            grid: GridConfig::default(),
            coordinator_address: DEFAULT_COORDINATOR_ADDR.to_string(),
            tick_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(5),
            settle_delay: Duration::from_secs(1),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl VehicleConfig {
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        if !self.start.in_bounds(self.grid.size) {
            return Err(ConvoyError::OutOfBounds {
                coordinate: self.start,
                grid_size: self.grid.size,
            });
        }
        if self.tick_interval.is_zero() || self.heartbeat_interval.is_zero() {
            return Err(ConvoyError::InvalidConfig {
                reason: "tick and heartbeat intervals must be non-zero".to_string(),
            });
        }
        if self.discovery.first_port > self.discovery.last_port {
            return Err(ConvoyError::InvalidConfig {
                reason: format!(
                    "discovery range {}..={} is empty",
                    self.discovery.first_port, self.discovery.last_port
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub grid: GridConfig,
    /// Period between synthesized delivery jobs.
    pub generate_interval: Duration,
    /// Wait between idle-vehicle lookups while a job is stalled.
    pub retry_backoff: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            generate_interval: Duration::from_secs(10),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        if self.generate_interval.is_zero() || self.retry_backoff.is_zero() {
            return Err(ConvoyError::InvalidConfig {
                reason: "dispatch intervals must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_skip_own_address() {
        let discovery = DiscoveryConfig {
            first_port: 50001,
            last_port: 50003,
            ..DiscoveryConfig::default()
        };
        assert_eq!(
            discovery.candidates("localhost:50002"),
            vec!["localhost:50001", "localhost:50003"]
        );
    }

    #[test]
    fn test_idle_mode_parsing() {
        assert_eq!("cost-minimizing".parse::<IdleMode>(), Ok(IdleMode::CostMinimizing));
        assert_eq!("random-walk".parse::<IdleMode>(), Ok(IdleMode::RandomWalk));
        assert!("teleport".parse::<IdleMode>().is_err());
    }

    #[test]
    fn test_start_outside_grid_rejected() {
        let config = VehicleConfig {
            start: Coordinate::new(8, 0),
            ..VehicleConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConvoyError::OutOfBounds { grid_size: 8, .. })
        ));
        assert!(VehicleConfig::default().validate().is_ok());
    }
}
