//! Discards retained history no connected client still needs.

use crate::stores::{EntityStore, MapStore};
use log::debug;
use shared::GameTick;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullOutcome {
    /// Floor did not move past the last applied one.
    Skipped,
    Advanced { from: GameTick, to: GameTick },
    /// Everything retained was dropped; nobody is connected.
    Purged,
}

pub struct HistoryCuller {
    entities: Arc<dyn EntityStore>,
    maps: Arc<dyn MapStore>,
    applied_floor: GameTick,
}

impl HistoryCuller {
    pub fn new(entities: Arc<dyn EntityStore>, maps: Arc<dyn MapStore>) -> Self {
        Self {
            entities,
            maps,
            applied_floor: GameTick::ZERO,
        }
    }

    /// Highest floor history has been culled to. Never decreases.
    pub fn applied_floor(&self) -> GameTick {
        self.applied_floor
    }

    /// Culls every store to `floor` if it is past the applied floor.
    ///
    /// `GameTick::MAX` purges all retained history unconditionally and leaves
    /// the applied floor untouched, so clients that connect afterwards start
    /// from a floor that can still advance.
    pub fn cull_to(&mut self, floor: GameTick) -> CullOutcome {
        if floor.is_max() {
            self.entities.cull_before(GameTick::MAX);
            self.maps.cull_before(GameTick::MAX);
            return CullOutcome::Purged;
        }

        if floor <= self.applied_floor {
            return CullOutcome::Skipped;
        }

        self.entities.cull_before(floor);
        self.maps.cull_before(floor);

        let from = self.applied_floor;
        self.applied_floor = floor;
        debug!("History floor advanced {} -> {}", from, floor);
        CullOutcome::Advanced { from, to: floor }
    }
}
