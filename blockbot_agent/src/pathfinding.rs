// Grid A* between a start cell and the nearest of several goal cells.
//
// Search nodes live in an arena (`Vec<Node>`) and point to their parent by
// index, so extending a path is O(1) instead of copying the cell list. The
// open set is a `BinaryHeap` turned into a min-heap by a reversed `Ord`,
// with an insertion counter as tie-break so equal priorities pop first-in first-out
// and the search is deterministic.
//
// Priority is `h * 101 + len * 100`, where `h` is the Manhattan distance to
// the nearest goal and `len` the number of steps taken. Weighting the
// heuristic by an extra 1% prefers expanding cells nearer the goal among
// equal-cost candidates. With unit steps and routes under 100 cells this
// still returns a shortest route.
//
// Visited cells are closed on first pop; later pops of the same cell are
// discarded. Cells farther than `max_radius` (Manhattan) from the start are
// never pushed, which bounds the search.
//
// See also: `world.rs` for the `Terrain` implementation the agent uses,
// `action.rs` where `Navigate` calls `find_path`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::error::WorldError;
use crate::types::BlockPos;
use crate::world::World;

/// Terrain queries the search needs.
pub trait Terrain {
    /// Whether the agent may stand with its feet in `pos`.
    fn is_enterable(&mut self, pos: BlockPos) -> Result<bool, WorldError>;

    /// Cells reachable from `pos` in one step.
    fn neighbors(&mut self, pos: BlockPos) -> SmallVec<[BlockPos; 12]>;
}

impl Terrain for World {
    fn is_enterable(&mut self, pos: BlockPos) -> Result<bool, WorldError> {
        World::is_enterable(self, pos)
    }

    fn neighbors(&mut self, pos: BlockPos) -> SmallVec<[BlockPos; 12]> {
        World::neighbors(self, pos)
    }
}

struct Node {
    pos: BlockPos,
    parent: Option<usize>,
    len: u32,
}

/// Entry in the open set (min-heap via reversed ordering).
#[derive(PartialEq, Eq)]
struct OpenEntry {
    priority: u64,
    seq: u64,
    node: usize,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest priority, then oldest, is "greatest".
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

fn heuristic(pos: BlockPos, goals: &[BlockPos]) -> u32 {
    goals
        .iter()
        .map(|g| pos.manhattan_distance(*g))
        .min()
        .unwrap_or(0)
}

fn priority(h: u32, len: u32) -> u64 {
    u64::from(h) * 101 + u64::from(len) * 100
}

fn reconstruct(nodes: &[Node], mut index: usize) -> Vec<BlockPos> {
    let mut path = Vec::with_capacity(nodes[index].len as usize);
    while let Some(parent) = nodes[index].parent {
        path.push(nodes[index].pos);
        index = parent;
    }
    path.reverse();
    path
}

/// Find a route from `start` to any of `goals`.
///
/// The route is a shortest one when it is under 100 steps long. Beyond that
/// the extra 1% weight on the heuristic can outbid one step of route length,
/// so a longer route is still valid and connected but may not be minimal.
/// `max_radius` bounds how far the route strays from `start`, not its length.
///
/// Returns `Ok(None)` when every goal is farther than `max_radius`, when no
/// goal is a legal place to stand, or when the reachable area is exhausted.
/// The route excludes `start` and ends on the goal reached; it is empty if
/// `start` is already a goal. If no goal could be checked because its chunk
/// is not loaded, that error is returned instead of a guess.
pub fn find_path<T: Terrain + ?Sized>(
    terrain: &mut T,
    start: BlockPos,
    goals: &[BlockPos],
    max_radius: u32,
) -> Result<Option<Vec<BlockPos>>, WorldError> {
    let in_range: SmallVec<[BlockPos; 16]> = goals
        .iter()
        .copied()
        .filter(|g| g.manhattan_distance(start) <= max_radius)
        .collect();
    if in_range.is_empty() {
        return Ok(None);
    }

    let mut valid: SmallVec<[BlockPos; 16]> = SmallVec::new();
    let mut first_error = None;
    for goal in in_range {
        match terrain.is_enterable(goal) {
            Ok(true) => valid.push(goal),
            Ok(false) => {}
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    if valid.is_empty() {
        return match first_error {
            Some(e) => Err(e),
            None => Ok(None),
        };
    }
    let goal_set: FxHashSet<BlockPos> = valid.iter().copied().collect();

    let mut nodes = vec![Node {
        pos: start,
        parent: None,
        len: 0,
    }];
    let mut visited: FxHashSet<BlockPos> = FxHashSet::default();
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;
    open.push(OpenEntry {
        priority: priority(heuristic(start, &valid), 0),
        seq,
        node: 0,
    });

    while let Some(entry) = open.pop() {
        let pos = nodes[entry.node].pos;
        if !visited.insert(pos) {
            continue;
        }
        if goal_set.contains(&pos) {
            return Ok(Some(reconstruct(&nodes, entry.node)));
        }

        let len = nodes[entry.node].len + 1;
        for next in terrain.neighbors(pos) {
            if visited.contains(&next) || next.manhattan_distance(start) > max_radius {
                continue;
            }
            nodes.push(Node {
                pos: next,
                parent: Some(entry.node),
                len,
            });
            seq += 1;
            open.push(OpenEntry {
                priority: priority(heuristic(next, &valid), len),
                seq,
                node: nodes.len() - 1,
            });
        }
    }
    Ok(None)
}
