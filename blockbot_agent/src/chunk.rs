// A cuboid region of block data and its lazy decoding.
//
// Chunks arrive as zlib-compressed payloads. Most of them are never looked
// at, so a chunk keeps the compressed bytes until the first query and only
// then inflates them into a sparse cell map (air cells are not stored).
// Inflating is idempotent: later queries reuse the map. A payload that fails
// to inflate marks the chunk corrupt. Every later query on it reports
// `WorldError::CorruptChunk`; other chunks are unaffected.
//
// Inflated payload layout, for a region of `n = sx * sy * sz` cells:
//   kinds     n bytes, index = y + z*sy + x*sy*sz
//   metadata  n/2 bytes of nibbles, low nibble = even index
//   light     ignored
// A payload shorter than `n` is corrupt; missing metadata reads as 0.
//
// See also: `world.rs`, which owns the chunks and routes queries to them.

use std::io::Read;

use bytes::Bytes;
use flate2::read::ZlibDecoder;
use rustc_hash::FxHashMap;
use tracing::error;

use crate::block::{AIR, Block};
use crate::error::WorldError;
use crate::types::{BlockPos, ChunkKey};

/// Size of a region in cells along each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extents {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Extents {
    /// A full 16x128x16 chunk.
    pub const FULL: Extents = Extents::new(16, 128, 16);

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn volume(self) -> usize {
        (self.x.max(0) as usize) * (self.y.max(0) as usize) * (self.z.max(0) as usize)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cell {
    kind: u8,
    metadata: u8,
}

/// Decoded contents of one region, in payload index order.
struct Region {
    extents: Extents,
    kinds: Vec<u8>,
    nibbles: Vec<u8>,
}

impl Region {
    fn cell(&self, index: usize) -> Cell {
        let packed = self.nibbles.get(index / 2).copied().unwrap_or(0);
        let metadata = if (index & 1) == 0 {
            packed & 0x0F
        } else {
            packed >> 4
        };
        Cell {
            kind: self.kinds[index],
            metadata,
        }
    }

    /// Every cell as (local offset, contents).
    fn cells(&self) -> impl Iterator<Item = (BlockPos, Cell)> + '_ {
        let Extents { x: sx, y: sy, z: sz } = self.extents;
        (0..sx).flat_map(move |x| {
            (0..sz).flat_map(move |z| {
                (0..sy).map(move |y| {
                    let index = (y + z * sy + x * sy * sz) as usize;
                    (BlockPos::new(x, y, z), self.cell(index))
                })
            })
        })
    }
}

fn inflate_region(payload: &[u8], extents: Extents) -> Result<Region, String> {
    let n = extents.volume();
    if n == 0 {
        return Err(format!("empty extents {extents:?}"));
    }
    // Kinds, metadata, block light and sky light.
    let limit = (n * 5 / 2 + 16) as u64;
    let mut data = Vec::with_capacity(n * 5 / 2);
    ZlibDecoder::new(payload)
        .take(limit)
        .read_to_end(&mut data)
        .map_err(|e| format!("inflate failed: {e}"))?;
    if data.len() < n {
        return Err(format!("payload has {} bytes, need {n}", data.len()));
    }
    let nibble_end = data.len().min(n + n.div_ceil(2));
    let nibbles = data[n..nibble_end].to_vec();
    data.truncate(n);
    Ok(Region {
        extents,
        kinds: data,
        nibbles,
    })
}

#[derive(Debug)]
enum ChunkState {
    Compressed(Bytes),
    Loaded(FxHashMap<BlockPos, Cell>),
    Corrupt(String),
}

/// One chunk, keyed in the world by the chunk containing its origin.
#[derive(Debug)]
pub struct Chunk {
    key: ChunkKey,
    origin: BlockPos,
    extents: Extents,
    state: ChunkState,
}

impl Chunk {
    /// A chunk holding an undecoded payload.
    pub fn compressed(origin: BlockPos, extents: Extents, payload: Bytes) -> Self {
        Self {
            key: origin.chunk_key(),
            origin,
            extents,
            state: ChunkState::Compressed(payload),
        }
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn origin(&self) -> BlockPos {
        self.origin
    }

    pub fn extents(&self) -> Extents {
        self.extents
    }

    pub fn is_inflated(&self) -> bool {
        !matches!(self.state, ChunkState::Compressed(_))
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        let o = self.origin;
        let e = self.extents;
        (o.x..o.x + e.x).contains(&pos.x)
            && (o.y..o.y + e.y).contains(&pos.y)
            && (o.z..o.z + e.z).contains(&pos.z)
    }

    /// Whether the region `origin + extents` lies entirely inside this chunk.
    pub fn covers(&self, origin: BlockPos, extents: Extents) -> bool {
        extents.volume() > 0
            && self.contains(origin)
            && self.contains(origin.offset(extents.x - 1, extents.y - 1, extents.z - 1))
    }

    fn cells(&mut self) -> Result<&mut FxHashMap<BlockPos, Cell>, WorldError> {
        if let ChunkState::Compressed(payload) = &self.state {
            let next = match inflate_region(payload, self.extents) {
                Ok(region) => ChunkState::Loaded(
                    region
                        .cells()
                        .filter(|(_, cell)| cell.kind != AIR)
                        .collect(),
                ),
                Err(reason) => {
                    error!(chunk = %self.key, %reason, "discarding corrupt chunk payload");
                    ChunkState::Corrupt(reason)
                }
            };
            self.state = next;
        }
        match &mut self.state {
            ChunkState::Loaded(cells) => Ok(cells),
            ChunkState::Corrupt(reason) => Err(WorldError::CorruptChunk {
                key: self.key,
                reason: reason.clone(),
            }),
            ChunkState::Compressed(_) => unreachable!("payload inflated above"),
        }
    }

    fn local(&self, pos: BlockPos) -> BlockPos {
        BlockPos::new(
            pos.x - self.origin.x,
            pos.y - self.origin.y,
            pos.z - self.origin.z,
        )
    }

    /// The block at absolute position `pos`, inflating on first access.
    pub fn block(&mut self, pos: BlockPos) -> Result<Block, WorldError> {
        if !self.contains(pos) {
            return Err(WorldError::ChunkNotLoaded(pos));
        }
        let local = self.local(pos);
        let cell = self.cells()?.get(&local).copied();
        Ok(match cell {
            Some(c) => Block::new(pos, c.kind, c.metadata),
            None => Block::new(pos, AIR, 0),
        })
    }

    /// Overwrite the block at absolute position `pos`.
    pub fn set(&mut self, pos: BlockPos, kind: u8, metadata: u8) -> Result<(), WorldError> {
        if !self.contains(pos) {
            return Err(WorldError::ChunkNotLoaded(pos));
        }
        let local = self.local(pos);
        let cells = self.cells()?;
        if kind == AIR {
            cells.remove(&local);
        } else {
            cells.insert(local, Cell { kind, metadata });
        }
        Ok(())
    }

    /// Write a compressed sub-region over the covered cells.
    pub fn merge(
        &mut self,
        origin: BlockPos,
        extents: Extents,
        payload: &[u8],
    ) -> Result<(), WorldError> {
        let region = inflate_region(payload, extents).map_err(|reason| WorldError::CorruptChunk {
            key: self.key,
            reason,
        })?;
        let offset = self.local(origin);
        let cells = self.cells()?;
        for (pos, cell) in region.cells() {
            let local = pos.offset(offset.x, offset.y, offset.z);
            if cell.kind == AIR {
                cells.remove(&local);
            } else {
                cells.insert(local, cell);
            }
        }
        Ok(())
    }

    /// Number of stored (non-air) cells, or `None` while still compressed.
    pub fn solid_count(&self) -> Option<usize> {
        match &self.state {
            ChunkState::Loaded(cells) => Some(cells.len()),
            _ => None,
        }
    }
}
