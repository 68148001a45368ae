//! Grid, route and vehicle state types

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Vehicle identifier; doubles as the vehicle's `host:port` address.
pub type VehicleId = String;

/// A cell on the square grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: &Coordinate) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn in_bounds(&self, grid_size: i32) -> bool {
        (0..grid_size).contains(&self.x) && (0..grid_size).contains(&self.y)
    }

    /// The neighbouring cell one unit step away. May lie outside the grid.
    pub fn step(&self, direction: Direction) -> Coordinate {
        let (dx, dy) = direction.delta();
        Coordinate::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Coordinate {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

/// Unit moves on the 4-connected grid. `Up` increases `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn reverse(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Ordered waypoints of a planned path.
///
/// Followers consume a route from the front, so a route held in a vehicle's
/// state always describes the waypoints still ahead of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route {
    waypoints: VecDeque<Coordinate>,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn first(&self) -> Option<Coordinate> {
        self.waypoints.front().copied()
    }

    pub fn last(&self) -> Option<Coordinate> {
        self.waypoints.back().copied()
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.waypoints.contains(coordinate)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coordinate> {
        self.waypoints.iter()
    }

    pub fn pop_front(&mut self) -> Option<Coordinate> {
        self.waypoints.pop_front()
    }

    /// Prepends `leg` so it is driven before the current waypoints.
    pub fn prepend(&mut self, leg: Route) {
        for coordinate in leg.waypoints.into_iter().rev() {
            self.waypoints.push_front(coordinate);
        }
    }

    /// Drops leading waypoints equal to `position`.
    pub fn skip_while_at(&mut self, position: Coordinate) {
        while self.waypoints.front() == Some(&position) {
            self.waypoints.pop_front();
        }
    }
}

impl From<Vec<Coordinate>> for Route {
    fn from(waypoints: Vec<Coordinate>) -> Self {
        Self {
            waypoints: waypoints.into(),
        }
    }
}

impl FromIterator<Coordinate> for Route {
    fn from_iter<I: IntoIterator<Item = Coordinate>>(iter: I) -> Self {
        Self {
            waypoints: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, coordinate) in self.waypoints.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{coordinate}")?;
        }
        f.write_str("]")
    }
}

/// Latest known state of one vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleState {
    pub id: VehicleId,
    pub position: Coordinate,
    #[serde(default)]
    pub route: Route,
    /// Committed to a dispatched job. Active vehicles are never offered new work.
    #[serde(default)]
    pub active_route: bool,
    /// Display colour, carried for the grid view only.
    #[serde(default)]
    pub tag: String,
}

impl VehicleState {
    pub fn new(id: impl Into<VehicleId>, position: Coordinate, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            position,
            route: Route::new(),
            active_route: false,
            tag: tag.into(),
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.active_route
    }
}
