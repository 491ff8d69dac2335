// Geometry primitives shared by the world store, path search and actions.
//
// `Vector` is the continuous position type (agent feet, focus points, entity
// positions). `BlockPos` is the integer grid cell and the key type for every
// lookup; a `Vector` reaches the grid only through `floor`/`to_cell`, which
// round toward negative infinity per axis. `ChunkKey` names the 16x128x16
// chunk that owns a cell. `walk_cells` lists the cells a ray passes
// through, for line-of-sight checks against the world.
//
// Angles follow the game's convention: yaw 0 faces +Z and grows toward -X,
// pitch is positive when looking down. Both are reported in degrees wrapped
// into [0, 360).

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Bits shifted off world coordinates to get chunk coordinates.
pub const CHUNK_SHIFT_X: u32 = 4;
pub const CHUNK_SHIFT_Y: u32 = 7;
pub const CHUNK_SHIFT_Z: u32 = 4;

/// Wrap an angle in degrees into [0, 360).
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

// ---------------------------------------------------------------------------
// Vector
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector {
    pub const ZERO: Vector = Vector::new(0.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn manhattan_length(self) -> f64 {
        self.x.abs() + self.y.abs() + self.z.abs()
    }

    pub fn distance(self, other: Vector) -> f64 {
        (other - self).length()
    }

    pub fn manhattan_distance(self, other: Vector) -> f64 {
        (other - self).manhattan_length()
    }

    /// Unit vector in the same direction. The zero vector stays zero.
    pub fn normalize(self) -> Vector {
        let len = self.length();
        if len == 0.0 { Vector::ZERO } else { self / len }
    }

    /// Per-axis floor, still as floats.
    pub fn floor(self) -> Vector {
        Vector::new(self.x.floor(), self.y.floor(), self.z.floor())
    }

    /// The grid cell containing this point.
    pub fn to_cell(self) -> BlockPos {
        let f = self.floor();
        BlockPos::new(f.x as i32, f.y as i32, f.z as i32)
    }

    /// Yaw and pitch (degrees, wrapped into [0, 360)) of a look along this
    /// direction.
    pub fn to_angles(self) -> (f64, f64) {
        let forward = (self.x * self.x + self.z * self.z).sqrt();
        let yaw = (-self.x).atan2(self.z).to_degrees();
        let pitch = -self.y.atan2(forward).to_degrees();
        (wrap_degrees(yaw), wrap_degrees(pitch))
    }
}

impl Add for Vector {
    type Output = Vector;
    fn add(self, o: Vector) -> Vector {
        Vector::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Vector {
    type Output = Vector;
    fn sub(self, o: Vector) -> Vector {
        Vector::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;
    fn mul(self, s: f64) -> Vector {
        Vector::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Div<f64> for Vector {
    type Output = Vector;
    fn div(self, s: f64) -> Vector {
        Vector::new(self.x / s, self.y / s, self.z / s)
    }
}

impl Neg for Vector {
    type Output = Vector;
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y, -self.z)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, o: Vector) {
        *self = *self + o;
    }
}

impl SubAssign for Vector {
    fn sub_assign(&mut self, o: Vector) {
        *self = *self - o;
    }
}

impl MulAssign<f64> for Vector {
    fn mul_assign(&mut self, s: f64) {
        *self = *self * s;
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// BlockPos / ChunkKey
// ---------------------------------------------------------------------------

/// An integer grid cell.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> BlockPos {
        BlockPos::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn up(self) -> BlockPos {
        self.offset(0, 1, 0)
    }

    pub fn down(self) -> BlockPos {
        self.offset(0, -1, 0)
    }

    pub fn manhattan_distance(self, other: BlockPos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y) + self.z.abs_diff(other.z)
    }

    pub fn chunk_key(self) -> ChunkKey {
        ChunkKey::new(
            self.x >> CHUNK_SHIFT_X,
            self.y >> CHUNK_SHIFT_Y,
            self.z >> CHUNK_SHIFT_Z,
        )
    }

    /// The minimum corner of the cell.
    pub fn corner(self) -> Vector {
        Vector::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }

    /// Geometric centre of the cell.
    pub fn center(self) -> Vector {
        self.corner() + Vector::new(0.5, 0.5, 0.5)
    }

    /// Where an agent's feet rest when standing in this cell.
    pub fn standing_point(self) -> Vector {
        self.corner() + Vector::new(0.5, 0.0, 0.5)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk grid coordinate: world coordinates shifted right by (4, 7, 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkKey {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The minimum cell of the full-size chunk with this key.
    pub fn origin(self) -> BlockPos {
        BlockPos::new(
            self.x << CHUNK_SHIFT_X,
            self.y << CHUNK_SHIFT_Y,
            self.z << CHUNK_SHIFT_Z,
        )
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Cell walk
// ---------------------------------------------------------------------------

/// Grid cells crossed by a ray, in crossing order, each paired with the
/// distance along the ray at which it is entered. The first item is the cell
/// holding the start point, at distance 0. The walk is unbounded; a zero
/// direction yields only the start cell.
///
/// Where the ray crosses several cell boundaries at once, the x step is
/// taken first, then y, then z.
#[derive(Clone, Debug)]
pub struct CellWalk {
    cell: BlockPos,
    step: [i32; 3],
    next_boundary: [f64; 3],
    boundary_gap: [f64; 3],
    started: bool,
}

/// Walk the cells along `direction` from `start` (Amanatides-Woo stepping).
pub fn walk_cells(start: Vector, direction: Vector) -> CellWalk {
    let dir = direction.normalize();
    let axis = |origin: f64, d: f64| -> (i32, f64, f64) {
        if d > 0.0 {
            (1, (origin.floor() + 1.0 - origin) / d, 1.0 / d)
        } else if d < 0.0 {
            (-1, (origin - origin.floor()) / -d, 1.0 / -d)
        } else {
            (0, f64::INFINITY, f64::INFINITY)
        }
    };
    let (sx, nx, gx) = axis(start.x, dir.x);
    let (sy, ny, gy) = axis(start.y, dir.y);
    let (sz, nz, gz) = axis(start.z, dir.z);
    CellWalk {
        cell: start.to_cell(),
        step: [sx, sy, sz],
        next_boundary: [nx, ny, nz],
        boundary_gap: [gx, gy, gz],
        started: false,
    }
}

impl Iterator for CellWalk {
    type Item = (BlockPos, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            return Some((self.cell, 0.0));
        }
        let nb = &self.next_boundary;
        let axis = (0..3).min_by(|&a, &b| nb[a].total_cmp(&nb[b]))?;
        let t = self.next_boundary[axis];
        if !t.is_finite() {
            return None;
        }
        self.next_boundary[axis] += self.boundary_gap[axis];
        let s = self.step[axis];
        self.cell = match axis {
            0 => self.cell.offset(s, 0, 0),
            1 => self.cell.offset(0, s, 0),
            _ => self.cell.offset(0, 0, s),
        };
        Some((self.cell, t))
    }
}

// ---------------------------------------------------------------------------
// Face
// ---------------------------------------------------------------------------

/// One of the six sides of a block, numbered as on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    Bottom = 0,
    Top = 1,
    North = 2,
    South = 3,
    West = 4,
    East = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Bottom,
        Face::Top,
        Face::North,
        Face::South,
        Face::West,
        Face::East,
    ];

    /// Outward unit normal as a grid step.
    pub fn normal(self) -> (i32, i32, i32) {
        match self {
            Face::Bottom => (0, -1, 0),
            Face::Top => (0, 1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::West => (-1, 0, 0),
            Face::East => (1, 0, 0),
        }
    }

    /// Centre of this face relative to the block's minimum corner.
    pub fn anchor(self) -> Vector {
        match self {
            Face::Bottom => Vector::new(0.5, 0.0, 0.5),
            Face::Top => Vector::new(0.5, 1.0, 0.5),
            Face::North => Vector::new(0.5, 0.5, 0.0),
            Face::South => Vector::new(0.5, 0.5, 1.0),
            Face::West => Vector::new(0.0, 0.5, 0.5),
            Face::East => Vector::new(1.0, 0.5, 0.5),
        }
    }

    pub fn opposite(self) -> Face {
        match self {
            Face::Bottom => Face::Top,
            Face::Top => Face::Bottom,
            Face::North => Face::South,
            Face::South => Face::North,
            Face::West => Face::East,
            Face::East => Face::West,
        }
    }

    /// The cell across this face from `pos`.
    pub fn neighbor_of(self, pos: BlockPos) -> BlockPos {
        let (dx, dy, dz) = self.normal();
        pos.offset(dx, dy, dz)
    }

    /// Wire code; "no face" is -1.
    pub fn code(face: Option<Face>) -> i8 {
        face.map_or(-1, |f| f as i8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn floor_rounds_toward_negative_infinity() {
        let v = Vector::new(-0.5, 1.999, -3.0).floor();
        assert_eq!(v, Vector::new(-1.0, 1.0, -3.0));
        assert_eq!(Vector::new(-0.01, 0.0, 15.99).to_cell(), BlockPos::new(-1, 0, 15));
    }

    #[test]
    fn arithmetic_does_not_mutate_operands() {
        let a = Vector::new(1.0, 2.0, 3.0);
        let b = Vector::new(0.5, 0.5, 0.5);
        let c = a + b;
        assert_eq!(a, Vector::new(1.0, 2.0, 3.0));
        assert_eq!(c, Vector::new(1.5, 2.5, 3.5));
        let mut d = a;
        d -= b;
        d *= 2.0;
        assert_eq!(d, Vector::new(1.0, 3.0, 5.0));
        assert_eq!(-a, Vector::new(-1.0, -2.0, -3.0));
    }

    #[test]
    fn lengths_and_normalize() {
        let v = Vector::new(3.0, -4.0, 0.0);
        assert!(approx(v.length(), 5.0));
        assert!(approx(v.manhattan_length(), 7.0));
        assert!(approx(v.normalize().length(), 1.0));
        assert_eq!(Vector::ZERO.normalize(), Vector::ZERO);
    }

    #[test]
    fn angles_follow_game_convention() {
        let (yaw, pitch) = Vector::new(0.0, 0.0, 1.0).to_angles();
        assert!(approx(yaw, 0.0) && approx(pitch, 0.0));

        let (yaw, _) = Vector::new(-1.0, 0.0, 0.0).to_angles();
        assert!(approx(yaw, 90.0));

        let (yaw, _) = Vector::new(1.0, 0.0, 0.0).to_angles();
        assert!(approx(yaw, 270.0));

        // Looking straight down is +90, straight up wraps to 270.
        let (_, pitch) = Vector::new(0.0, -1.0, 0.0).to_angles();
        assert!(approx(pitch, 90.0));
        let (_, pitch) = Vector::new(0.0, 1.0, 0.0).to_angles();
        assert!(approx(pitch, 270.0));
    }

    #[test]
    fn wrap_degrees_lands_in_range() {
        assert!(approx(wrap_degrees(-90.0), 270.0));
        assert!(approx(wrap_degrees(720.5), 0.5));
        assert_eq!(wrap_degrees(-1e-18), 0.0);
    }

    #[test]
    fn chunk_keys_shift_toward_negative_infinity() {
        assert_eq!(BlockPos::new(15, 127, 0).chunk_key(), ChunkKey::new(0, 0, 0));
        assert_eq!(BlockPos::new(16, 128, -1).chunk_key(), ChunkKey::new(1, 1, -1));
        assert_eq!(ChunkKey::new(-1, 0, 2).origin(), BlockPos::new(-16, 0, 32));
    }

    fn cells(walk: CellWalk, n: usize) -> Vec<(i32, i32, i32)> {
        walk.take(n).map(|(c, _)| (c.x, c.y, c.z)).collect()
    }

    #[test]
    fn walk_steps_through_every_crossed_cell() {
        let start = Vector::new(0.5, 0.5, 0.5);
        let walk = walk_cells(start, Vector::new(4.0, 6.0, 0.0));
        assert_eq!(
            cells(walk, 6),
            vec![(0, 0, 0), (0, 1, 0), (1, 1, 0), (1, 2, 0), (2, 2, 0), (2, 3, 0)]
        );

        let walk = walk_cells(start, Vector::new(-1.0, 0.0, -2.0));
        assert_eq!(
            cells(walk, 5),
            vec![(0, 0, 0), (0, 0, -1), (-1, 0, -1), (-1, 0, -2), (-1, 0, -3)]
        );
    }

    #[test]
    fn walk_reports_entry_distances() {
        let walk = walk_cells(Vector::new(0.25, 0.5, 0.5), Vector::new(1.0, 0.0, 0.0));
        let steps: Vec<(i32, f64)> = walk.take(3).map(|(c, t)| (c.x, t)).collect();
        assert_eq!(steps, vec![(0, 0.0), (1, 0.75), (2, 1.75)]);
    }

    #[test]
    fn walk_leaves_a_boundary_start_at_once_when_heading_negative() {
        let walk = walk_cells(Vector::new(1.0, 0.5, 0.5), Vector::new(-1.0, 0.0, 0.0));
        assert_eq!(cells(walk, 3), vec![(1, 0, 0), (0, 0, 0), (-1, 0, 0)]);
    }

    #[test]
    fn zero_direction_walks_nowhere() {
        let walk = walk_cells(Vector::new(3.5, -0.5, 0.5), Vector::ZERO);
        assert_eq!(cells(walk, 10), vec![(3, -1, 0)]);
    }

    #[test]
    fn faces_are_consistent() {
        for face in Face::ALL {
            let (dx, dy, dz) = face.normal();
            let (ox, oy, oz) = face.opposite().normal();
            assert_eq!((dx + ox, dy + oy, dz + oz), (0, 0, 0));
            // The anchor sits on the side the normal points to.
            let a = face.anchor() - Vector::new(0.5, 0.5, 0.5);
            assert!(approx(a.x * 2.0, f64::from(dx)));
            assert!(approx(a.y * 2.0, f64::from(dy)));
            assert!(approx(a.z * 2.0, f64::from(dz)));
        }
        assert_eq!(Face::code(Some(Face::East)), 5);
        assert_eq!(Face::code(None), -1);
    }
}
