// Table of other entities the server has told us about.
//
// Positions arrive as fixed-point integers (1/32 of a block) and angles as
// single bytes (1/256 of a turn); both are converted here so the rest of the
// agent works in blocks and degrees. Relative moves are small signed byte
// deltas in the same fixed-point unit.
//
// Named entities (players) are also indexed by name so commands like `come`
// can find the speaker.

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use crate::types::{Vector, wrap_degrees};

/// Fixed-point wire position to blocks.
pub fn from_fixed(v: i64) -> f64 {
    v as f64 / 32.0
}

/// Byte angle to degrees in [0, 360).
pub fn from_byte_angle(a: i64) -> f64 {
    wrap_degrees((a as f64) * 360.0 / 256.0)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Entity {
    pub id: i32,
    /// Player name; mobs have none.
    pub name: Option<String>,
    /// Mob type code, if this is a mob.
    pub mob_type: Option<i8>,
    pub position: Vector,
    pub yaw: f64,
    pub pitch: f64,
    pub held_item: i16,
}

impl Entity {
    fn new(id: i32, position: Vector) -> Self {
        Self {
            id,
            name: None,
            mob_type: None,
            position,
            yaw: 0.0,
            pitch: 0.0,
            held_item: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Entities {
    by_id: FxHashMap<i32, Entity>,
    names: FxHashMap<String, i32>,
}

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&Entity> {
        self.by_id.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Entity> {
        self.names.get(name).and_then(|id| self.by_id.get(id))
    }

    fn insert(&mut self, entity: Entity) {
        if let Some(name) = self.by_id.remove(&entity.id).and_then(|old| old.name) {
            self.names.remove(&name);
        }
        if let Some(name) = &entity.name {
            self.names.insert(name.clone(), entity.id);
        }
        self.by_id.insert(entity.id, entity);
    }

    /// A player came into view. Coordinates are fixed-point, angles bytes.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn_named(
        &mut self,
        id: i32,
        name: &str,
        x: i64,
        y: i64,
        z: i64,
        yaw: i64,
        pitch: i64,
        held_item: i16,
    ) {
        let mut entity = Entity::new(id, Vector::new(from_fixed(x), from_fixed(y), from_fixed(z)));
        entity.name = Some(name.to_owned());
        entity.yaw = from_byte_angle(yaw);
        entity.pitch = from_byte_angle(pitch);
        entity.held_item = held_item;
        debug!(id, name, position = %entity.position, "player spawned");
        self.insert(entity);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn spawn_mob(&mut self, id: i32, mob_type: i8, x: i64, y: i64, z: i64, yaw: i64, pitch: i64) {
        let mut entity = Entity::new(id, Vector::new(from_fixed(x), from_fixed(y), from_fixed(z)));
        entity.mob_type = Some(mob_type);
        entity.yaw = from_byte_angle(yaw);
        entity.pitch = from_byte_angle(pitch);
        self.insert(entity);
    }

    /// Apply a relative move. Returns false for an unknown id.
    pub fn relative_move(&mut self, id: i32, dx: i64, dy: i64, dz: i64) -> bool {
        match self.by_id.get_mut(&id) {
            Some(e) => {
                e.position += Vector::new(from_fixed(dx), from_fixed(dy), from_fixed(dz));
                true
            }
            None => false,
        }
    }

    pub fn look(&mut self, id: i32, yaw: i64, pitch: i64) -> bool {
        match self.by_id.get_mut(&id) {
            Some(e) => {
                e.yaw = from_byte_angle(yaw);
                e.pitch = from_byte_angle(pitch);
                true
            }
            None => false,
        }
    }

    /// Absolute reposition.
    pub fn teleport(&mut self, id: i32, x: i64, y: i64, z: i64, yaw: i64, pitch: i64) -> bool {
        match self.by_id.get_mut(&id) {
            Some(e) => {
                e.position = Vector::new(from_fixed(x), from_fixed(y), from_fixed(z));
                e.yaw = from_byte_angle(yaw);
                e.pitch = from_byte_angle(pitch);
                true
            }
            None => false,
        }
    }

    pub fn destroy(&mut self, id: i32) -> Option<Entity> {
        let entity = self.by_id.remove(&id)?;
        if let Some(name) = &entity.name {
            self.names.remove(name);
        }
        Some(entity)
    }
}
