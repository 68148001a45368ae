//! BDD Tests for Convoy Core

use convoy_core::*;
use cucumber::{given, then, when, World};
use std::collections::HashSet;

#[derive(Debug, World)]
#[world(init = Self::new)]
struct CoreWorld {
    planner: PathPlanner,
    avoid: HashSet<Coordinate>,
    last_route: Option<Route>,
    last_error: Option<ConvoyError>,
}

impl CoreWorld {
    fn new() -> Self {
        Self {
            planner: PathPlanner::new(GridConfig::default().size),
            avoid: HashSet::new(),
            last_route: None,
            last_error: None,
        }
    }
}

#[given(expr = "an {int}x{int} grid")]
async fn given_grid(world: &mut CoreWorld, width: i32, _height: i32) {
    world.planner = PathPlanner::new(width);
}

#[given(expr = "the cell {int},{int} is reserved")]
async fn given_reserved_cell(world: &mut CoreWorld, x: i32, y: i32) {
    world.avoid.insert(Coordinate::new(x, y));
}

#[when(expr = "I plan a path from {int},{int} to {int},{int}")]
async fn when_plan_path(world: &mut CoreWorld, sx: i32, sy: i32, ex: i32, ey: i32) {
    match world
        .planner
        .find_path(Coordinate::new(sx, sy), Coordinate::new(ex, ey), &world.avoid)
    {
        Ok(route) => world.last_route = Some(route),
        Err(err) => world.last_error = Some(err),
    }
}

#[then(expr = "the path should be {string}")]
async fn then_path_should_be(world: &mut CoreWorld, expected: String) {
    let route = world.last_route.as_ref().expect("no route planned");
    let rendered = route
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    assert_eq!(rendered, expected);
}

#[then(expr = "the path should have {int} cells")]
async fn then_path_has_cells(world: &mut CoreWorld, cells: usize) {
    let route = world.last_route.as_ref().expect("no route planned");
    assert_eq!(route.len(), cells);
}

#[then(expr = "I should get a {string} error")]
async fn then_should_get_error(world: &mut CoreWorld, message: String) {
    let error = world.last_error.as_ref().expect("expected an error");
    assert!(error.to_string().contains(&message));
}

#[tokio::main]
async fn main() {
    CoreWorld::run("tests/features").await;
}
