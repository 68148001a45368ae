//! # Convoy Coordinator
//!
//! Central service of a Convoy fleet: ingests vehicle reports into the fleet
//! registry, generates and dispatches delivery routes, and serves a text view
//! of the grid.

mod api;
pub mod grid;

pub use api::{router, CoordinatorState, DispatchAccepted, DispatchRequest};
pub use grid::{CellMark, GridView};
