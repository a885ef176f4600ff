//! Pathfinding: BFS over 4-connected passable tiles with a bounded
//! explored-node count and direction tie-break for determinism.

use std::collections::{HashMap, VecDeque};

use crate::grid::{TileCoord, WorldGrid};

/// Direction priority for deterministic tie-breaking: up, right, down, left.
const DIRECTIONS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Finds a shortest path (in tile steps, excluding `from`) from `from` to
/// `to` over 4-connected passable neighbors. Returns `None` if `to` is
/// unreachable within `max_explored` expansions.
pub fn find_path(
    grid: &WorldGrid,
    from: TileCoord,
    to: TileCoord,
    max_explored: usize,
) -> Option<Vec<TileCoord>> {
    if from == to {
        return Some(Vec::new());
    }
    if grid.is_blocked(to.tx, to.ty) {
        return None;
    }

    let mut came_from: HashMap<TileCoord, TileCoord> = HashMap::new();
    let mut visited: HashMap<TileCoord, bool> = HashMap::new();
    let mut queue: VecDeque<TileCoord> = VecDeque::new();

    visited.insert(from, true);
    queue.push_back(from);
    let mut explored = 0usize;

    while let Some(current) = queue.pop_front() {
        explored += 1;
        if explored > max_explored {
            return None;
        }

        if current == to {
            return Some(reconstruct(&came_from, from, to));
        }

        for (dx, dy) in DIRECTIONS {
            let next = TileCoord::new(current.tx + dx, current.ty + dy);
            if visited.contains_key(&next) {
                continue;
            }
            if !grid.can_move_to(current, next) {
                continue;
            }
            visited.insert(next, true);
            came_from.insert(next, current);
            queue.push_back(next);
        }
    }

    None
}

fn reconstruct(
    came_from: &HashMap<TileCoord, TileCoord>,
    from: TileCoord,
    to: TileCoord,
) -> Vec<TileCoord> {
    let mut path = vec![to];
    let mut current = to;
    while current != from {
        current = came_from[&current];
        if current == from {
            break;
        }
        path.push(current);
    }
    path.reverse();
    path
}
