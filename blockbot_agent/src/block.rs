// Block kinds and their gameplay properties.
//
// `CATALOG` is a subset of the block table: enough to tell passable cells
// from solid ones for path search and to time digging. Kinds missing from
// the catalog are treated as solid, dug with the default tool, and take the
// default (very long) mining time, so an unknown block never looks cheap to
// walk through or quick to break.
//
// Mining time is the time with the preferred tool; the number of dig ticks
// is `ceil(seconds * tick_rate)`. Most times were measured in game. The
// rest (grass, plants, torches, wool, snow) are estimates and are flagged
// as such, so callers can tell a guessed duration from a measured one.

use crate::types::{BlockPos, Face, Vector};

/// Tool assumed for kinds the catalog does not list.
pub const DEFAULT_TOOL: u16 = 0x104;
/// Mining time assumed for kinds the catalog does not list or cannot be mined.
pub const DEFAULT_MINING_SECONDS: f64 = 20.0;

pub const AIR: u8 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Material {
    Air,
    Solid,
    Liquid,
    /// Occupies a cell but does not block movement (flowers, torches).
    Passable,
}

/// Preferred tool item id and the mining time with it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mining {
    pub tool: u16,
    pub seconds: f64,
    /// False when `seconds` is an estimate rather than a measurement.
    pub measured: bool,
}

const fn measured(tool: u16, seconds: f64) -> Option<Mining> {
    Some(Mining {
        tool,
        seconds,
        measured: true,
    })
}

const fn estimated(tool: u16, seconds: f64) -> Option<Mining> {
    Some(Mining {
        tool,
        seconds,
        measured: false,
    })
}

#[derive(Debug)]
pub struct BlockInfo {
    pub kind: u8,
    pub name: &'static str,
    pub material: Material,
    pub mining: Option<Mining>,
}

const fn entry(
    kind: u8,
    name: &'static str,
    material: Material,
    mining: Option<Mining>,
) -> BlockInfo {
    BlockInfo {
        kind,
        name,
        material,
        mining,
    }
}

const PICKAXE: u16 = 0x116;
const SHOVEL: u16 = 0x115;
const AXE: u16 = 0x117;
const SHEARS: u16 = 0x114;

use Material::{Air, Liquid, Passable, Solid};

pub static CATALOG: &[BlockInfo] = &[
    entry(0x00, "air", Air, None),
    entry(0x01, "stone", Solid, measured(PICKAXE, 0.59)),
    entry(0x02, "grass", Solid, estimated(SHOVEL, 0.44)),
    entry(0x03, "dirt", Solid, measured(SHOVEL, 0.39)),
    entry(0x04, "cobblestone", Solid, measured(PICKAXE, 0.68)),
    entry(0x05, "wood", Solid, measured(AXE, 0.68)),
    entry(0x06, "sapling", Passable, estimated(AXE, 0.05)),
    entry(0x07, "bedrock", Solid, None),
    entry(0x08, "water", Liquid, None),
    entry(0x09, "still water", Liquid, None),
    entry(0x0A, "lava", Liquid, None),
    entry(0x0B, "still lava", Liquid, None),
    entry(0x0C, "sand", Solid, measured(SHOVEL, 0.39)),
    entry(0x0D, "gravel", Solid, measured(SHOVEL, 0.39)),
    entry(0x0E, "gold ore", Solid, measured(PICKAXE, 0.89)),
    entry(0x0F, "iron ore", Solid, measured(PICKAXE, 0.89)),
    entry(0x10, "coal ore", Solid, measured(PICKAXE, 0.89)),
    entry(0x11, "log", Solid, measured(AXE, 0.68)),
    entry(0x12, "leaves", Solid, measured(SHEARS, 0.5)),
    entry(0x14, "glass", Solid, measured(SHEARS, 0.58)),
    entry(0x23, "wool", Solid, estimated(SHEARS, 0.8)),
    entry(0x25, "yellow flower", Passable, estimated(AXE, 0.05)),
    entry(0x26, "red rose", Passable, estimated(AXE, 0.05)),
    entry(0x29, "gold block", Solid, measured(PICKAXE, 1.24)),
    entry(0x2A, "iron block", Solid, measured(PICKAXE, 1.24)),
    entry(0x31, "obsidian", Solid, measured(PICKAXE, 15.35)),
    entry(0x32, "torch", Passable, estimated(AXE, 0.05)),
    entry(0x35, "stairs", Solid, measured(PICKAXE, 0.68)),
    entry(0x36, "chest", Solid, measured(AXE, 0.76)),
    entry(0x38, "diamond ore", Solid, measured(PICKAXE, 0.89)),
    entry(0x39, "diamond block", Solid, measured(PICKAXE, 1.24)),
    entry(0x3A, "workbench", Solid, measured(AXE, 4.06)),
    entry(0x3D, "furnace", Solid, measured(PICKAXE, 5.52)),
    entry(0x4E, "snow", Passable, estimated(SHOVEL, 0.1)),
];

pub fn info(kind: u8) -> Option<&'static BlockInfo> {
    CATALOG.iter().find(|b| b.kind == kind)
}

/// A cell's contents at a known position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    pub pos: BlockPos,
    pub kind: u8,
    pub metadata: u8,
}

impl Block {
    pub fn new(pos: BlockPos, kind: u8, metadata: u8) -> Self {
        Self {
            pos,
            kind,
            metadata,
        }
    }

    pub fn info(&self) -> Option<&'static BlockInfo> {
        info(self.kind)
    }

    pub fn name(&self) -> &'static str {
        self.info().map_or("unknown", |i| i.name)
    }

    pub fn material(&self) -> Material {
        self.info().map_or(Material::Solid, |i| i.material)
    }

    pub fn is_air(&self) -> bool {
        self.kind == AIR
    }

    pub fn is_solid(&self) -> bool {
        self.material() == Material::Solid
    }

    pub fn is_liquid(&self) -> bool {
        self.material() == Material::Liquid
    }

    pub fn preferred_tool(&self) -> u16 {
        self.info()
            .and_then(|i| i.mining)
            .map_or(DEFAULT_TOOL, |m| m.tool)
    }

    pub fn mining_seconds(&self) -> f64 {
        self.info()
            .and_then(|i| i.mining)
            .map_or(DEFAULT_MINING_SECONDS, |m| m.seconds)
    }

    /// Whether `mining_seconds` is a measured time. Defaults and estimates
    /// are not.
    pub fn mining_time_is_measured(&self) -> bool {
        self.info()
            .and_then(|i| i.mining)
            .is_some_and(|m| m.measured)
    }

    /// Ticks of continued digging needed to break this block.
    pub fn dig_ticks(&self, tick_rate: f64) -> u32 {
        (self.mining_seconds() * tick_rate).ceil() as u32
    }

    /// All six faces with their world-space centres, nearest to `observer`
    /// first.
    pub fn faces(&self, observer: Vector) -> [(Face, Vector); 6] {
        let corner = self.pos.corner();
        let mut faces = Face::ALL.map(|f| (f, corner + f.anchor()));
        faces.sort_by(|a, b| {
            observer
                .distance(a.1)
                .total_cmp(&observer.distance(b.1))
        });
        faces
    }
}
