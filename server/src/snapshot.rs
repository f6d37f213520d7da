use crate::stores::{EntityStore, MapStore, PlayerStore};
use shared::{GameStateSnapshot, GameTick};
use std::sync::Arc;

/// Assembles the shared state snapshot for one replication cycle.
pub struct SnapshotBuilder {
    entities: Arc<dyn EntityStore>,
    players: Arc<dyn PlayerStore>,
    maps: Arc<dyn MapStore>,
}

impl SnapshotBuilder {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        players: Arc<dyn PlayerStore>,
        maps: Arc<dyn MapStore>,
    ) -> Self {
        Self {
            entities,
            players,
            maps,
        }
    }

    /// Collects every change in `(floor, current]`. Read-only.
    pub fn build(&self, floor: GameTick, current: GameTick) -> GameStateSnapshot {
        debug_assert!(
            !floor.is_max(),
            "snapshots must be bounded by a real client ack"
        );

        GameStateSnapshot {
            from_tick: floor,
            to_tick: current,
            entities: self.entities.deltas_since(floor),
            players: self.players.states_since(floor),
            deletions: self.entities.deleted_since(floor),
            map_deltas: self.maps.deltas_since(floor),
        }
    }
}
