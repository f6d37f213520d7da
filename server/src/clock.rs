use shared::GameTick;
use std::sync::atomic::{AtomicU32, Ordering};

/// Current simulation step, advanced only by the tick loop.
///
/// Replication reads it; the network receiver also reads it to reject acks
/// for ticks that have not happened yet.
#[derive(Debug)]
pub struct TickClock {
    current: AtomicU32,
}

impl TickClock {
    pub fn new() -> Self {
        Self::starting_at(GameTick::FIRST)
    }

    pub fn starting_at(tick: GameTick) -> Self {
        debug_assert!(!tick.is_max(), "clock cannot start at the sentinel tick");
        Self {
            current: AtomicU32::new(tick.0),
        }
    }

    pub fn current(&self) -> GameTick {
        GameTick(self.current.load(Ordering::Acquire))
    }

    /// Moves to the next tick and returns it.
    pub fn advance(&self) -> GameTick {
        let next = self.current().next();
        self.current.store(next.0, Ordering::Release);
        next
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}
