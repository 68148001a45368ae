pub use convoy_core;

mod agent;
pub mod drive;
mod gossip;

pub use agent::{DriveMode, VehicleAgent};
pub use gossip::{PeerEntry, PeerGossip, PeerTable};

// Re-export core types for convenience
pub use convoy_core::{Coordinate, ConvoyError, IdleMode, Result, Route, VehicleConfig, VehicleState};
