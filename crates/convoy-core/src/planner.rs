//! Breadth-first path planning on the 4-connected grid

use crate::error::{ConvoyError, Result};
use crate::model::{Coordinate, Route};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, instrument};

/// Expansion order: +x, -x, +y, -y. Keeps equally short paths reproducible.
const EXPANSION: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Shortest-path planner over a `grid_size` x `grid_size` grid.
#[derive(Debug, Clone, Copy)]
pub struct PathPlanner {
    grid_size: i32,
}

impl PathPlanner {
    pub fn new(grid_size: i32) -> Self {
        Self { grid_size }
    }

    pub fn grid_size(&self) -> i32 {
        self.grid_size
    }

    /// Plans an unobstructed shortest path.
    pub fn plan(&self, start: Coordinate, end: Coordinate) -> Result<Route> {
        self.find_path(start, end, &HashSet::new())
    }

    /// Finds a shortest path from `start` to `end`, both inclusive.
    ///
    /// Cells in `avoid` are impassable except `end` itself, which can always be
    /// entered. Returns [`ConvoyError::PathNotFound`] when `end` is unreachable;
    /// callers treat that as "no safe route right now".
    #[instrument(level = "debug", skip(self, avoid), fields(avoid = avoid.len()))]
    pub fn find_path(
        &self,
        start: Coordinate,
        end: Coordinate,
        avoid: &HashSet<Coordinate>,
    ) -> Result<Route> {
        let not_found = || ConvoyError::PathNotFound { start, end };

        if !start.in_bounds(self.grid_size) || !end.in_bounds(self.grid_size) {
            return Err(not_found());
        }
        if start == end {
            return Ok(Route::from(vec![start]));
        }

        // Each cell is entered once; the parent map doubles as the visited set.
        let mut parents: HashMap<Coordinate, Coordinate> = HashMap::new();
        let mut visited: HashSet<Coordinate> = HashSet::from([start]);
        let mut frontier = VecDeque::from([start]);

        while let Some(current) = frontier.pop_front() {
            for (dx, dy) in EXPANSION {
                let next = Coordinate::new(current.x + dx, current.y + dy);
                if !next.in_bounds(self.grid_size) || visited.contains(&next) {
                    continue;
                }
                if next != end && avoid.contains(&next) {
                    continue;
                }

                visited.insert(next);
                parents.insert(next, current);

                if next == end {
                    let route = Self::unwind(&parents, start, end);
                    debug!(steps = route.len() - 1, "path found");
                    return Ok(route);
                }
                frontier.push_back(next);
            }
        }

        debug!("no path");
        Err(not_found())
    }

    fn unwind(parents: &HashMap<Coordinate, Coordinate>, start: Coordinate, end: Coordinate) -> Route {
        let mut cells = vec![end];
        let mut cursor = end;
        while cursor != start {
            cursor = parents[&cursor];
            cells.push(cursor);
        }
        cells.reverse();
        Route::from(cells)
    }
}
