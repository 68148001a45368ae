pub use convoy_core;

mod dispatcher;
mod registry;

pub use dispatcher::Dispatcher;
pub use registry::{FleetEntry, FleetRegistry, StateChange};

// Re-export core types for convenience
pub use convoy_core::{Coordinate, ConvoyError, DispatchConfig, Result, Route, VehicleState};
