//! Text grid view
//!
//! Follows the registry change feed and keeps one mark per cell. Route cells
//! are painted when a vehicle takes a new route and consumed as it drives over
//! them; a vehicle crossing someone else's route is drawn on top of it.

use convoy_core::{Coordinate, VehicleId, VehicleState};
use convoy_dispatch::StateChange;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

pub const EMPTY_MARK: char = '.';
pub const VEHICLE_MARK: char = 'V';
pub const ROUTE_MARK: char = '+';
pub const VEHICLE_ON_ROUTE_MARK: char = 'X';

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellMark {
    #[default]
    Empty,
    Vehicle {
        vehicle: VehicleId,
        tag: String,
    },
    Route {
        owner: VehicleId,
        tag: String,
    },
    /// A vehicle standing on a cell of another vehicle's route.
    VehicleOnRoute {
        vehicle: VehicleId,
        owner: VehicleId,
        tag: String,
    },
}

impl CellMark {
    pub fn symbol(&self) -> char {
        match self {
            CellMark::Empty => EMPTY_MARK,
            CellMark::Vehicle { .. } => VEHICLE_MARK,
            CellMark::Route { .. } => ROUTE_MARK,
            CellMark::VehicleOnRoute { .. } => VEHICLE_ON_ROUTE_MARK,
        }
    }

    /// Tag of the vehicle the mark is drawn for. On a crossed route this is
    /// the route owner's tag.
    pub fn tag(&self) -> Option<&str> {
        match self {
            CellMark::Empty => None,
            CellMark::Vehicle { tag, .. }
            | CellMark::Route { tag, .. }
            | CellMark::VehicleOnRoute { tag, .. } => Some(tag),
        }
    }
}

#[derive(Debug)]
pub struct GridView {
    size: i32,
    cells: RwLock<Vec<CellMark>>,
}

impl GridView {
    pub fn new(size: i32) -> Self {
        let cells = (size.max(0) as usize).pow(2);
        Self {
            size,
            cells: RwLock::new(vec![CellMark::Empty; cells]),
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    fn index(&self, cell: Coordinate) -> Option<usize> {
        cell.in_bounds(self.size)
            .then(|| (cell.x * self.size + cell.y) as usize)
    }

    pub fn mark(&self, cell: Coordinate) -> CellMark {
        self.index(cell)
            .map(|i| self.cells.read()[i].clone())
            .unwrap_or_default()
    }

    /// Applies one registry update to the marks.
    pub fn apply(&self, change: &StateChange) {
        let current = &change.current;
        let previous = change.previous.as_ref();
        let mut cells = self.cells.write();

        if is_new_route(previous, current) {
            for mark in cells.iter_mut() {
                if matches!(mark, CellMark::Route { owner, .. } if *owner == current.id) {
                    *mark = CellMark::Empty;
                }
            }
            for cell in current.route.iter() {
                if let Some(i) = self.index(*cell) {
                    cells[i] = CellMark::Route {
                        owner: current.id.clone(),
                        tag: current.tag.clone(),
                    };
                }
            }
            debug!(vehicle = %current.id, route = %current.route, "route painted");
        }

        if let Some(i) = previous.and_then(|p| self.index(p.position)) {
            cells[i] = match std::mem::take(&mut cells[i]) {
                CellMark::Vehicle { vehicle, .. } if vehicle == current.id => CellMark::Empty,
                CellMark::VehicleOnRoute { vehicle, owner, tag } if vehicle == current.id => {
                    CellMark::Route { owner, tag }
                }
                other => other,
            };
        }

        let Some(i) = self.index(current.position) else {
            warn!(vehicle = %current.id, position = %current.position, "position outside the grid view");
            return;
        };
        cells[i] = match std::mem::take(&mut cells[i]) {
            CellMark::Route { owner, tag } | CellMark::VehicleOnRoute { owner, tag, .. }
                if owner != current.id =>
            {
                CellMark::VehicleOnRoute {
                    vehicle: current.id.clone(),
                    owner,
                    tag,
                }
            }
            _ => CellMark::Vehicle {
                vehicle: current.id.clone(),
                tag: current.tag.clone(),
            },
        };
    }

    /// One line per row, top row first, followed by a legend of vehicle tags.
    pub fn render(&self) -> String {
        let cells = self.cells.read();
        let mut out = String::new();
        let mut legend: Vec<(&str, &str)> = Vec::new();

        for y in (0..self.size).rev() {
            for x in 0..self.size {
                let mark = &cells[(x * self.size + y) as usize];
                out.push(mark.symbol());
                match mark {
                    CellMark::Vehicle { vehicle, tag } | CellMark::VehicleOnRoute { vehicle, tag, .. } => {
                        legend.push((vehicle.as_str(), tag.as_str()))
                    }
                    _ => {}
                }
            }
            out.push('\n');
        }

        legend.sort();
        for (vehicle, tag) in legend {
            let _ = writeln!(out, "{VEHICLE_MARK} {vehicle} {tag}");
        }
        out
    }

    /// Applies changes until the registry is dropped.
    pub async fn follow(&self, mut changes: broadcast::Receiver<StateChange>) {
        info!(size = self.size, "Grid view following fleet changes");
        loop {
            match changes.recv().await {
                Ok(change) => self.apply(&change),
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Grid view fell behind the change feed");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

fn is_new_route(previous: Option<&VehicleState>, current: &VehicleState) -> bool {
    if !current.active_route || current.route.is_empty() {
        return false;
    }
    match previous {
        Some(previous) if previous.active_route => {
            // A driven route only ever shrinks from the front.
            current.route.len() > previous.route.len()
                || current.route.last() != previous.route.last()
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_core::Route;

    fn c(x: i32, y: i32) -> Coordinate {
        Coordinate::new(x, y)
    }

    fn change(previous: Option<&VehicleState>, current: &VehicleState) -> StateChange {
        StateChange {
            previous: previous.cloned(),
            current: current.clone(),
        }
    }

    fn vehicle(id: &str, x: i32, y: i32) -> VehicleState {
        VehicleState::new(id, c(x, y), "Rot")
    }

    #[test]
    fn test_vehicle_moves_clear_old_cell() {
        let grid = GridView::new(4);
        let a0 = vehicle("a", 0, 0);
        let a1 = vehicle("a", 1, 0);
        grid.apply(&change(None, &a0));
        assert_eq!(grid.mark(c(0, 0)).symbol(), VEHICLE_MARK);

        grid.apply(&change(Some(&a0), &a1));
        assert_eq!(grid.mark(c(0, 0)), CellMark::Empty);
        assert_eq!(grid.mark(c(1, 0)).tag(), Some("Rot"));
    }

    #[test]
    fn test_route_painted_and_consumed() {
        let grid = GridView::new(4);
        let idle = vehicle("a", 0, 0);
        let mut claimed = idle.clone();
        claimed.active_route = true;
        claimed.route = Route::from(vec![c(0, 0), c(0, 1), c(0, 2)]);
        grid.apply(&change(None, &idle));
        grid.apply(&change(Some(&idle), &claimed));

        assert_eq!(grid.mark(c(0, 0)).symbol(), VEHICLE_MARK);
        assert_eq!(grid.mark(c(0, 2)).symbol(), ROUTE_MARK);

        let mut driving = claimed.clone();
        driving.position = c(0, 1);
        driving.route = Route::from(vec![c(0, 2)]);
        grid.apply(&change(Some(&claimed), &driving));

        assert_eq!(grid.mark(c(0, 0)), CellMark::Empty);
        assert_eq!(grid.mark(c(0, 1)).symbol(), VEHICLE_MARK);
        assert_eq!(grid.mark(c(0, 2)).symbol(), ROUTE_MARK);
    }

    #[test]
    fn test_crossing_foreign_route_keeps_it() {
        let grid = GridView::new(4);
        let mut owner = VehicleState::new("a", c(3, 3), "Blau");
        owner.active_route = true;
        owner.route = Route::from(vec![c(1, 0), c(1, 1), c(1, 2)]);
        grid.apply(&change(None, &owner));

        let b0 = vehicle("b", 0, 1);
        let b1 = vehicle("b", 1, 1);
        let b2 = vehicle("b", 2, 1);
        grid.apply(&change(None, &b0));
        grid.apply(&change(Some(&b0), &b1));
        let crossed = grid.mark(c(1, 1));
        assert_eq!(crossed.symbol(), VEHICLE_ON_ROUTE_MARK);
        assert_eq!(crossed.tag(), Some("Blau"));

        grid.apply(&change(Some(&b1), &b2));
        assert_eq!(
            grid.mark(c(1, 1)),
            CellMark::Route {
                owner: "a".into(),
                tag: "Blau".into()
            }
        );
    }

    #[test]
    fn test_new_route_replaces_old_marks() {
        let grid = GridView::new(4);
        let mut first = vehicle("a", 0, 0);
        first.active_route = true;
        first.route = Route::from(vec![c(0, 0), c(0, 1), c(0, 2)]);
        grid.apply(&change(None, &first));

        let mut second = first.clone();
        second.route = Route::from(vec![c(0, 0), c(1, 0)]);
        grid.apply(&change(Some(&first), &second));

        assert_eq!(grid.mark(c(0, 2)), CellMark::Empty);
        assert_eq!(grid.mark(c(1, 0)).symbol(), ROUTE_MARK);
    }

    #[test]
    fn test_render_top_row_first() {
        let grid = GridView::new(3);
        grid.apply(&change(None, &vehicle("a", 0, 2)));
        let rendered = grid.render();
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("V.."));
        assert_eq!(lines.next(), Some("..."));
        assert_eq!(lines.next(), Some("..."));
        assert_eq!(lines.next(), Some("V a Rot"));
    }

    #[test]
    fn test_off_grid_position_ignored() {
        let grid = GridView::new(2);
        grid.apply(&change(None, &vehicle("a", 5, 5)));
        assert!(grid.render().starts_with("..\n..\n"));
    }
}
