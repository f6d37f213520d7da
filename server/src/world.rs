//! Authoritative world state and its replication history
//!
//! `EntityHistory` and `MapHistory` keep the current state stamped with the
//! tick it last changed, plus a record of deletions so clients that have not
//! yet acknowledged a deletion still hear about it. Deletion records are the
//! only history that grows; culling trims them below the replication floor.

use crate::stores::{EntityStore, MapStore};
use log::info;
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    EntityId, EntityState, GameTick, MapDelta, MapId, ENTITY_SIZE, ENTITY_SPEED, MAP_HEIGHT,
    MAP_WIDTH, WORLD_HEIGHT, WORLD_WIDTH,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct EntityTable {
    entities: HashMap<EntityId, EntityState>,
    deletions: Vec<(EntityId, GameTick)>,
    next_id: EntityId,
}

#[derive(Debug, Default)]
pub struct EntityHistory {
    table: RwLock<EntityTable>,
}

impl EntityHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, x: f32, y: f32, vel_x: f32, vel_y: f32, tick: GameTick) -> EntityId {
        let mut table = self.table.write();
        table.next_id += 1;
        let id = table.next_id;

        let mut entity = EntityState::new(id, x, y, tick);
        entity.vel_x = vel_x;
        entity.vel_y = vel_y;
        table.entities.insert(id, entity);
        id
    }

    /// Removes a live entity and records the deletion at `tick`.
    pub fn despawn(&self, id: EntityId, tick: GameTick) -> bool {
        let mut table = self.table.write();
        if table.entities.remove(&id).is_none() {
            return false;
        }
        table.deletions.push((id, tick));
        true
    }

    pub fn get(&self, id: EntityId) -> Option<EntityState> {
        self.table.read().entities.get(&id).cloned()
    }

    /// Moves every entity by its velocity, bouncing off the world edges.
    pub fn integrate(&self, dt: f32, tick: GameTick) {
        let mut table = self.table.write();
        for entity in table.entities.values_mut() {
            if entity.vel_x == 0.0 && entity.vel_y == 0.0 {
                continue;
            }

            entity.x += entity.vel_x * dt;
            entity.y += entity.vel_y * dt;

            if entity.x <= 0.0 || entity.x >= WORLD_WIDTH - ENTITY_SIZE {
                entity.vel_x = -entity.vel_x;
                entity.x = entity.x.clamp(0.0, WORLD_WIDTH - ENTITY_SIZE);
            }
            if entity.y <= 0.0 || entity.y >= WORLD_HEIGHT - ENTITY_SIZE {
                entity.vel_y = -entity.vel_y;
                entity.y = entity.y.clamp(0.0, WORLD_HEIGHT - ENTITY_SIZE);
            }

            entity.last_modified = tick;
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().entities.is_empty()
    }

    pub fn retained_deletions(&self) -> usize {
        self.table.read().deletions.len()
    }
}

impl EntityStore for EntityHistory {
    fn deltas_since(&self, tick: GameTick) -> Vec<EntityState> {
        let mut deltas: Vec<EntityState> = self
            .table
            .read()
            .entities
            .values()
            .filter(|entity| entity.last_modified > tick)
            .cloned()
            .collect();
        deltas.sort_unstable_by_key(|entity| entity.id);
        deltas
    }

    fn deleted_since(&self, tick: GameTick) -> Vec<EntityId> {
        self.table
            .read()
            .deletions
            .iter()
            .filter(|(_, deleted_at)| *deleted_at > tick)
            .map(|(id, _)| *id)
            .collect()
    }

    fn cull_before(&self, tick: GameTick) {
        self.table
            .write()
            .deletions
            .retain(|(_, deleted_at)| *deleted_at >= tick);
    }
}

#[derive(Debug, Default)]
struct MapTable {
    tiles: HashMap<(MapId, i32, i32), (u16, GameTick)>,
    deleted_maps: Vec<(MapId, GameTick)>,
}

#[derive(Debug, Default)]
pub struct MapHistory {
    table: RwLock<MapTable>,
}

impl MapHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tile(&self, map_id: MapId, x: i32, y: i32, tile: u16, tick: GameTick) {
        self.table.write().tiles.insert((map_id, x, y), (tile, tick));
    }

    pub fn tile(&self, map_id: MapId, x: i32, y: i32) -> Option<u16> {
        self.table.read().tiles.get(&(map_id, x, y)).map(|(tile, _)| *tile)
    }

    /// Drops every tile of the map and records the deletion at `tick`.
    pub fn delete_map(&self, map_id: MapId, tick: GameTick) -> bool {
        let mut table = self.table.write();
        let before = table.tiles.len();
        table.tiles.retain(|(map, _, _), _| *map != map_id);
        if table.tiles.len() == before {
            return false;
        }
        table.deleted_maps.push((map_id, tick));
        true
    }

    pub fn retained_deletions(&self) -> usize {
        self.table.read().deleted_maps.len()
    }
}

impl MapStore for MapHistory {
    fn deltas_since(&self, tick: GameTick) -> Vec<MapDelta> {
        let table = self.table.read();

        let mut deltas: Vec<MapDelta> = table
            .tiles
            .iter()
            .filter(|(_, (_, changed_at))| *changed_at > tick)
            .map(|((map_id, x, y), (tile, changed_at))| MapDelta::TileChanged {
                map_id: *map_id,
                x: *x,
                y: *y,
                tile: *tile,
                tick: *changed_at,
            })
            .collect();

        deltas.extend(
            table
                .deleted_maps
                .iter()
                .filter(|(_, deleted_at)| *deleted_at > tick)
                .map(|(map_id, deleted_at)| MapDelta::MapDeleted {
                    map_id: *map_id,
                    tick: *deleted_at,
                }),
        );

        deltas.sort_by_key(|delta| delta.tick());
        deltas
    }

    fn cull_before(&self, tick: GameTick) {
        self.table
            .write()
            .deleted_maps
            .retain(|(_, deleted_at)| *deleted_at >= tick);
    }
}

/// Map every player stands on.
pub const MAIN_MAP: MapId = 0;
const TILE_KINDS: u16 = 4;

/// Demo simulation feeding the replication stores
pub struct World {
    entities: Arc<EntityHistory>,
    maps: Arc<MapHistory>,
    rng: StdRng,
    tile_churn: f64,
}

impl World {
    pub fn new(seed: Option<u64>, tile_churn: f64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let maps = Arc::new(MapHistory::new());
        for y in 0..MAP_HEIGHT {
            for x in 0..MAP_WIDTH {
                maps.set_tile(MAIN_MAP, x, y, 0, GameTick::FIRST);
            }
        }

        Self {
            entities: Arc::new(EntityHistory::new()),
            maps,
            rng,
            tile_churn,
        }
    }

    pub fn entities(&self) -> Arc<EntityHistory> {
        Arc::clone(&self.entities)
    }

    pub fn maps(&self) -> Arc<MapHistory> {
        Arc::clone(&self.maps)
    }

    /// Spawns a wandering avatar for a newly connected player.
    pub fn spawn_avatar(&mut self, tick: GameTick) -> EntityId {
        let x = self.rng.gen_range(0.0..WORLD_WIDTH - ENTITY_SIZE);
        let y = self.rng.gen_range(0.0..WORLD_HEIGHT - ENTITY_SIZE);
        let angle: f32 = self.rng.gen_range(0.0..std::f32::consts::TAU);

        let id = self.entities.spawn(
            x,
            y,
            angle.cos() * ENTITY_SPEED,
            angle.sin() * ENTITY_SPEED,
            tick,
        );
        info!("Spawned avatar {} at ({:.1}, {:.1})", id, x, y);
        id
    }

    pub fn despawn(&mut self, id: EntityId, tick: GameTick) {
        if self.entities.despawn(id, tick) {
            info!("Despawned entity {}", id);
        }
    }

    pub fn step(&mut self, dt: f32, tick: GameTick) {
        self.entities.integrate(dt, tick);

        if self.tile_churn > 0.0 && self.rng.gen_bool(self.tile_churn) {
            let x = self.rng.gen_range(0..MAP_WIDTH);
            let y = self.rng.gen_range(0..MAP_HEIGHT);
            let tile = self.rng.gen_range(0..TILE_KINDS);
            self.maps.set_tile(MAIN_MAP, x, y, tile, tick);
        }
    }
}
