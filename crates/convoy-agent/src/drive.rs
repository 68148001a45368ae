//! Idle driving rules
//!
//! Pure step functions; the agent applies their result under its state lock.
//! Neither rule ever yields a cell outside the grid.

use convoy_core::{Coordinate, Direction};
use rand::Rng;

/// Evaluation order of the cost-minimizing walk; `None` holds position.
/// Ties resolve to the earliest entry.
pub const CANDIDATE_ORDER: [Option<Direction>; 5] = [
    Some(Direction::Up),
    Some(Direction::Down),
    Some(Direction::Left),
    Some(Direction::Right),
    None,
];

/// Picks a random unit move that stays on the grid and does not undo
/// `last_move`.
///
/// Drawing uniformly from the admissible directions is the same distribution
/// as redrawing from all four until one is accepted. In a dead end the reverse
/// move is allowed, and on a 1x1 grid there is no move at all.
pub fn random_step<R: Rng + ?Sized>(
    position: Coordinate,
    last_move: Option<Direction>,
    grid_size: i32,
    rng: &mut R,
) -> Option<Direction> {
    let on_grid: Vec<Direction> = Direction::ALL
        .into_iter()
        .filter(|direction| position.step(*direction).in_bounds(grid_size))
        .collect();
    let forward: Vec<Direction> = on_grid
        .iter()
        .copied()
        .filter(|direction| Some(direction.reverse()) != last_move)
        .collect();

    let choices = if forward.is_empty() { on_grid } else { forward };
    if choices.is_empty() {
        return None;
    }
    Some(choices[rng.random_range(0..choices.len())])
}

/// Sum of `1 / distance` to every peer; peers on `candidate` itself add nothing.
pub fn repulsion_cost(candidate: Coordinate, peers: &[Coordinate]) -> f64 {
    peers
        .iter()
        .map(|peer| candidate.manhattan(peer))
        .filter(|distance| *distance != 0)
        .map(|distance| 1.0 / f64::from(distance))
        .sum()
}

/// The on-grid neighbour (or the current cell) with the lowest repulsion cost.
pub fn cost_minimizing_step(position: Coordinate, peers: &[Coordinate], grid_size: i32) -> Coordinate {
    let mut best = position;
    let mut lowest = f64::INFINITY;

    for candidate in CANDIDATE_ORDER {
        let cell = candidate.map_or(position, |direction| position.step(direction));
        if !cell.in_bounds(grid_size) {
            continue;
        }
        let cost = repulsion_cost(cell, peers);
        if cost < lowest {
            lowest = cost;
            best = cell;
        }
    }
    best
}
