//! Error types for the Convoy fleet engine

use crate::model::Coordinate;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvoyError>;

#[derive(Error, Debug)]
pub enum ConvoyError {
    #[error("No path found from {start} to {end}")]
    PathNotFound { start: Coordinate, end: Coordinate },

    #[error("Coordinate {coordinate} is outside the {grid_size}x{grid_size} grid")]
    OutOfBounds {
        coordinate: Coordinate,
        grid_size: i32,
    },

    #[error("Invalid route: {reason}")]
    InvalidRoute { reason: String },

    #[error("Transport to {address} failed: {reason}")]
    TransportFailure { address: String, reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Serialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },
}

impl ConvoyError {
    pub fn transport(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::TransportFailure {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error came from the network boundary rather than from local state.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }
}
