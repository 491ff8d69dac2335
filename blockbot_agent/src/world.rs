// Known terrain: the chunk map and the movement queries built on it.
//
// `World` owns every loaded region, grouped by the chunk that contains the
// region's origin. Several disjoint partial regions can share one key; a
// coordinate is answered by the newest region under its key whose bounds
// contain it, so `has_chunk` and `get_block` always agree.
//
// Queries take `&mut self` because the first access to a chunk inflates it.
//
// Updates for regions the world does not know are dropped, logged at warn,
// and reported to the caller as `ChangeOutcome::Dropped`. A change can
// arrive before the chunk it belongs to; such changes are discarded rather
// than queued for replay, and the next full chunk payload supersedes them.
//
// `is_enterable` and `neighbors` define where the agent may stand and step.
// They are the only terrain interface the path search uses (via the
// `Terrain` trait in `pathfinding.rs`).

use bytes::Bytes;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::block::Block;
use crate::chunk::{Chunk, Extents};
use crate::error::WorldError;
use crate::types::{BlockPos, ChunkKey, Vector, walk_cells};

/// Distance past the end of a sight line still accepted as reaching the
/// target, to absorb rounding when the line ends on a face.
const SIGHT_SLACK: f64 = 1e-6;

/// Lateral step directions (dx, dz).
const LATERAL: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Whether a terrain update was applied or dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOutcome {
    Applied,
    Dropped,
}

/// One entry of a batched change: a packed chunk-local coordinate
/// (x:4 | z:4 | y:8) plus the new kind and metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchEntry {
    pub coord: u16,
    pub kind: u8,
    pub metadata: u8,
}

impl BatchEntry {
    /// The unpacked chunk-local (x, y, z).
    pub fn local(&self) -> (i32, i32, i32) {
        let c = i32::from(self.coord);
        ((c & 0xF000) >> 12, c & 0x00FF, (c & 0x0F00) >> 8)
    }
}

#[derive(Debug, Default)]
pub struct World {
    chunks: FxHashMap<ChunkKey, SmallVec<[Chunk; 1]>>,
    allow_flight: bool,
    dropped_changes: u64,
}

impl World {
    pub fn new(allow_flight: bool) -> Self {
        Self {
            allow_flight,
            ..Self::default()
        }
    }

    pub fn allow_flight(&self) -> bool {
        self.allow_flight
    }

    pub fn set_allow_flight(&mut self, allow: bool) {
        self.allow_flight = allow;
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Regions held across all chunk keys.
    pub fn region_count(&self) -> usize {
        self.chunks.values().map(|regions| regions.len()).sum()
    }

    /// Changes discarded so far because their region was not loaded.
    pub fn dropped_changes(&self) -> u64 {
        self.dropped_changes
    }

    pub fn has_chunk(&self, pos: BlockPos) -> bool {
        self.chunks
            .get(&pos.chunk_key())
            .is_some_and(|regions| regions.iter().any(|c| c.contains(pos)))
    }

    /// Register a region payload, kept compressed until first access.
    ///
    /// A region that lies strictly inside an already-known region is merged
    /// into it. Otherwise it is stored alongside the other regions under its
    /// key, and any region it fully covers (including an identical resend)
    /// is discarded.
    pub fn on_region_loaded(&mut self, origin: BlockPos, extents: Extents, payload: Bytes) {
        let key = origin.chunk_key();
        let regions = self.chunks.entry(key).or_default();
        let host = regions.iter_mut().rev().find(|existing| {
            let same_region = existing.origin() == origin && existing.extents() == extents;
            !same_region && existing.covers(origin, extents)
        });
        if let Some(existing) = host {
            match existing.merge(origin, extents, &payload) {
                Ok(()) => debug!(chunk = %key, %origin, ?extents, "merged partial region"),
                Err(e) => warn!(chunk = %key, error = %e, "dropping partial region"),
            }
            return;
        }
        let bytes = payload.len();
        let region = Chunk::compressed(origin, extents, payload);
        let before = regions.len();
        regions.retain(|old| !region.covers(old.origin(), old.extents()));
        debug!(
            chunk = %key,
            %origin,
            ?extents,
            bytes,
            replaced = before - regions.len(),
            "region loaded"
        );
        regions.push(region);
    }

    /// Forget a chunk. Returns whether it was known.
    pub fn unload(&mut self, key: ChunkKey) -> bool {
        self.chunks.remove(&key).is_some()
    }

    fn chunk_for(&mut self, pos: BlockPos) -> Result<&mut Chunk, WorldError> {
        self.chunks
            .get_mut(&pos.chunk_key())
            .and_then(|regions| regions.iter_mut().rev().find(|c| c.contains(pos)))
            .ok_or(WorldError::ChunkNotLoaded(pos))
    }

    pub fn get_block(&mut self, pos: BlockPos) -> Result<Block, WorldError> {
        self.chunk_for(pos)?.block(pos)
    }

    /// Set one block. Unknown regions drop the change.
    pub fn apply_single_change(&mut self, pos: BlockPos, kind: u8, metadata: u8) -> ChangeOutcome {
        let result = self
            .chunk_for(pos)
            .and_then(|chunk| chunk.set(pos, kind, metadata));
        match result {
            Ok(()) => ChangeOutcome::Applied,
            Err(e) => {
                self.dropped_changes += 1;
                warn!(%pos, kind, error = %e, "dropping block change");
                ChangeOutcome::Dropped
            }
        }
    }

    /// Apply a batch of changes within the column of chunk (`chunk_x`,
    /// `chunk_z`). Entries whose region is unknown are dropped individually.
    pub fn apply_batch_change(
        &mut self,
        chunk_x: i32,
        chunk_z: i32,
        entries: &[BatchEntry],
    ) -> ChangeOutcome {
        let origin = ChunkKey::new(chunk_x, 0, chunk_z).origin();
        let mut outcome = ChangeOutcome::Applied;
        for entry in entries {
            let (x, y, z) = entry.local();
            let pos = origin.offset(x, y, z);
            if self.apply_single_change(pos, entry.kind, entry.metadata) == ChangeOutcome::Dropped {
                outcome = ChangeOutcome::Dropped;
            }
        }
        outcome
    }

    /// Whether the agent can stand with its feet in `pos`: the cell and the
    /// one above are free, and there is support below unless flying.
    pub fn is_enterable(&mut self, pos: BlockPos) -> Result<bool, WorldError> {
        if self.get_block(pos)?.is_solid() || self.get_block(pos.up())?.is_solid() {
            return Ok(false);
        }
        if self.allow_flight {
            return Ok(true);
        }
        let below = self.get_block(pos.down())?;
        Ok(below.is_solid() || below.is_liquid())
    }

    /// Whether the segment from `from` to `to` enters `target` without first
    /// passing through a solid cell or one in an unknown chunk.
    pub fn has_line_of_sight(&mut self, from: Vector, to: Vector, target: BlockPos) -> bool {
        let length = from.distance(to);
        for (cell, t) in walk_cells(from, to - from) {
            if cell == target {
                return true;
            }
            if t > length + SIGHT_SLACK || !self.is_clear(cell) {
                return false;
            }
        }
        false
    }

    fn is_clear(&mut self, pos: BlockPos) -> bool {
        self.get_block(pos).is_ok_and(|b| !b.is_solid())
    }

    fn enterable_or_skip(&mut self, pos: BlockPos) -> bool {
        self.is_enterable(pos).unwrap_or(false)
    }

    /// Cells reachable from `pos` in one step: per lateral direction the
    /// level cell, the cell one up (needs head room above `pos`) and the cell
    /// one down (needs the lateral head cell clear). Cells in unknown chunks
    /// are skipped rather than guessed.
    pub fn neighbors(&mut self, pos: BlockPos) -> SmallVec<[BlockPos; 12]> {
        let mut out = SmallVec::new();
        let head_room = self.is_clear(pos.offset(0, 2, 0));
        for (dx, dz) in LATERAL {
            let level = pos.offset(dx, 0, dz);
            if self.enterable_or_skip(level) {
                out.push(level);
            }
            let up = pos.offset(dx, 1, dz);
            if head_room && self.enterable_or_skip(up) {
                out.push(up);
            }
            let down = pos.offset(dx, -1, dz);
            if self.is_clear(pos.offset(dx, 1, dz)) && self.enterable_or_skip(down) {
                out.push(down);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{compress_region, floor_world};

    const STONE: u8 = 1;
    const COBBLE: u8 = 4;
    const WATER: u8 = 9;

    #[test]
    fn lookups_outside_known_chunks_fail() {
        let mut world = floor_world(&[]);
        assert!(world.has_chunk(BlockPos::new(15, 127, 15)));
        assert!(!world.has_chunk(BlockPos::new(16, 0, 0)));
        assert_eq!(
            world.get_block(BlockPos::new(-1, 0, 0)).unwrap_err(),
            WorldError::ChunkNotLoaded(BlockPos::new(-1, 0, 0))
        );
        assert_eq!(world.get_block(BlockPos::new(3, 0, 3)).unwrap().kind, STONE);
    }

    #[test]
    fn partial_chunk_only_covers_its_extents() {
        let mut world = World::new(false);
        let extents = Extents::new(4, 4, 4);
        world.on_region_loaded(
            BlockPos::new(32, 0, 0),
            extents,
            compress_region(extents, |_| (STONE, 0)),
        );
        assert!(world.get_block(BlockPos::new(35, 3, 3)).is_ok());
        assert!(!world.has_chunk(BlockPos::new(36, 0, 0)));
        assert!(world.get_block(BlockPos::new(36, 0, 0)).is_err());
    }

    #[test]
    fn sub_region_merges_into_loaded_chunk() {
        let mut world = floor_world(&[]);
        let extents = Extents::new(1, 1, 1);
        world.on_region_loaded(
            BlockPos::new(7, 5, 7),
            extents,
            compress_region(extents, |_| (COBBLE, 2)),
        );
        assert_eq!(world.chunk_count(), 1);
        let b = world.get_block(BlockPos::new(7, 5, 7)).unwrap();
        assert_eq!((b.kind, b.metadata), (COBBLE, 2));
        assert_eq!(world.get_block(BlockPos::new(0, 0, 0)).unwrap().kind, STONE);
    }

    #[test]
    fn full_resend_replaces_chunk() {
        let mut world = floor_world(&[]);
        world.on_region_loaded(
            BlockPos::new(0, 0, 0),
            Extents::FULL,
            compress_region(Extents::FULL, |_| (0, 0)),
        );
        assert!(world.get_block(BlockPos::new(0, 0, 0)).unwrap().is_air());
        assert_eq!(world.region_count(), 1);
    }

    #[test]
    fn disjoint_partial_regions_share_a_chunk_key() {
        let mut world = World::new(false);
        let extents = Extents::new(4, 4, 4);
        world.on_region_loaded(
            BlockPos::new(36, 0, 0),
            extents,
            compress_region(extents, |_| (STONE, 0)),
        );
        world.on_region_loaded(
            BlockPos::new(40, 0, 0),
            extents,
            compress_region(extents, |_| (COBBLE, 0)),
        );
        assert_eq!(world.chunk_count(), 1);
        assert_eq!(world.region_count(), 2);
        assert!(world.has_chunk(BlockPos::new(36, 0, 0)));
        assert!(world.has_chunk(BlockPos::new(43, 3, 3)));
        assert_eq!(world.get_block(BlockPos::new(37, 1, 1)).unwrap().kind, STONE);
        assert_eq!(world.get_block(BlockPos::new(41, 1, 1)).unwrap().kind, COBBLE);
        assert!(!world.has_chunk(BlockPos::new(44, 0, 0)));

        // A full chunk covering both supersedes them.
        world.on_region_loaded(
            BlockPos::new(32, 0, 0),
            Extents::FULL,
            compress_region(Extents::FULL, |_| (0, 0)),
        );
        assert_eq!(world.region_count(), 1);
        assert!(world.get_block(BlockPos::new(37, 1, 1)).unwrap().is_air());
        assert!(world.get_block(BlockPos::new(41, 1, 1)).unwrap().is_air());
    }

    #[test]
    fn line_of_sight_stops_at_solid_cells() {
        let target = BlockPos::new(5, 1, 5);
        let mut world = floor_world(&[(target, COBBLE), (BlockPos::new(5, 1, 3), STONE)]);
        let eye = Vector::new(5.5, 2.62, 2.5);
        let top = target.corner() + Vector::new(0.5, 1.0, 0.5);
        let north = target.corner() + Vector::new(0.5, 0.5, 0.0);
        assert!(world.has_line_of_sight(eye, top, target));
        assert!(!world.has_line_of_sight(eye, north, target));

        // Unknown terrain blocks the view; a segment that stops short misses.
        assert!(!world.has_line_of_sight(Vector::new(-0.5, 1.5, 5.5), top, target));
        assert!(!world.has_line_of_sight(eye, eye + Vector::new(0.0, 0.0, 1.0), target));
    }

    #[test]
    fn unload_forgets_the_chunk() {
        let mut world = floor_world(&[]);
        assert!(world.unload(ChunkKey::new(0, 0, 0)));
        assert!(!world.unload(ChunkKey::new(0, 0, 0)));
        assert!(world.get_block(BlockPos::new(1, 1, 1)).is_err());
    }

    #[test]
    fn single_change_applies_or_drops() {
        let mut world = floor_world(&[]);
        let pos = BlockPos::new(4, 1, 4);
        assert_eq!(world.apply_single_change(pos, COBBLE, 0), ChangeOutcome::Applied);
        assert_eq!(world.get_block(pos).unwrap().kind, COBBLE);

        let far = BlockPos::new(100, 1, 100);
        assert_eq!(world.apply_single_change(far, COBBLE, 0), ChangeOutcome::Dropped);
        assert_eq!(world.dropped_changes(), 1);
    }

    #[test]
    fn batch_change_unpacks_coordinates() {
        let mut world = floor_world(&[]);
        let entries = [
            BatchEntry {
                coord: 0x3540,
                kind: COBBLE,
                metadata: 1,
            },
            BatchEntry {
                coord: 0x0000,
                kind: 0,
                metadata: 0,
            },
        ];
        assert_eq!(entries[0].local(), (3, 0x40, 5));
        assert_eq!(world.apply_batch_change(0, 0, &entries), ChangeOutcome::Applied);
        assert_eq!(world.get_block(BlockPos::new(3, 64, 5)).unwrap().kind, COBBLE);
        assert!(world.get_block(BlockPos::new(0, 0, 0)).unwrap().is_air());

        assert_eq!(world.apply_batch_change(2, 0, &entries), ChangeOutcome::Dropped);
        assert_eq!(world.dropped_changes(), 2);
    }

    #[test]
    fn enterable_needs_clearance_and_support() {
        let wall = BlockPos::new(5, 2, 5);
        let mut world = floor_world(&[(wall, STONE), (BlockPos::new(8, 0, 8), WATER)]);
        assert!(world.is_enterable(BlockPos::new(3, 1, 3)).unwrap());
        // No head room under the wall block.
        assert!(!world.is_enterable(BlockPos::new(5, 1, 5)).unwrap());
        // Floating one above the floor.
        assert!(!world.is_enterable(BlockPos::new(3, 2, 3)).unwrap());
        // Liquid counts as support.
        assert!(world.is_enterable(BlockPos::new(8, 1, 8)).unwrap());
        // Inside the floor.
        assert!(!world.is_enterable(BlockPos::new(3, 0, 3)).unwrap());

        world.set_allow_flight(true);
        assert!(world.is_enterable(BlockPos::new(3, 2, 3)).unwrap());
    }

    #[test]
    fn enterable_propagates_unloaded_chunks() {
        let mut world = floor_world(&[]);
        assert!(matches!(
            world.is_enterable(BlockPos::new(20, 1, 3)),
            Err(WorldError::ChunkNotLoaded(_))
        ));
    }

    #[test]
    fn neighbors_on_flat_ground() {
        let mut world = floor_world(&[]);
        let mut n = world.neighbors(BlockPos::new(5, 1, 5)).into_vec();
        n.sort();
        assert_eq!(
            n,
            vec![
                BlockPos::new(4, 1, 5),
                BlockPos::new(5, 1, 4),
                BlockPos::new(5, 1, 6),
                BlockPos::new(6, 1, 5),
            ]
        );
    }

    #[test]
    fn neighbors_step_up_and_down() {
        // A one-block step east of the start, and a one-block pit to the west.
        let step = BlockPos::new(6, 1, 5);
        let mut world = floor_world(&[(step, STONE)]);
        world.apply_single_change(BlockPos::new(4, 0, 5), 0, 0);
        world.apply_single_change(BlockPos::new(4, -1, 5), STONE, 0);

        let n = world.neighbors(BlockPos::new(5, 1, 5));
        assert!(n.contains(&BlockPos::new(6, 2, 5)));
        assert!(!n.contains(&step));
        // The pit floor is outside the chunk, so stepping down into it is
        // unknown and skipped.
        assert!(!n.contains(&BlockPos::new(4, 0, 5)));
    }

    #[test]
    fn neighbors_step_down_inside_chunk() {
        let mut world = floor_world(&[(BlockPos::new(5, 1, 5), STONE)]);
        let n = world.neighbors(BlockPos::new(5, 2, 5));
        assert!(n.contains(&BlockPos::new(6, 1, 5)));
        assert!(n.contains(&BlockPos::new(4, 1, 5)));
        assert_eq!(n.len(), 4);
    }

    #[test]
    fn step_up_needs_head_room() {
        let mut world = floor_world(&[
            (BlockPos::new(6, 1, 5), STONE),
            (BlockPos::new(5, 3, 5), STONE),
        ]);
        let n = world.neighbors(BlockPos::new(5, 1, 5));
        assert!(!n.contains(&BlockPos::new(6, 2, 5)));
    }
}
