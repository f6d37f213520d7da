//! Per-connection acknowledgment table
//!
//! Maps each live connection to the last tick its client reported as fully
//! applied. The broadcast cycle registers connections and reads the oldest
//! ack; the network receive path records acks and the disconnect path
//! removes entries. Both sides run concurrently, so the table sits behind a
//! mutex and every operation sees a consistent view of it.
//!
//! Connection ids are never reused, so removal is final: a removed id is
//! remembered and later registrations of it are refused. The broadcast cycle
//! lists connections before it registers them, and a disconnect can land in
//! between.

use log::{debug, trace};
use parking_lot::Mutex;
use shared::{ConnectionId, GameTick};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct AckTable {
    acks: HashMap<ConnectionId, GameTick>,
    /// Removed connections that may still show up in a stale listing.
    departed: HashSet<ConnectionId>,
}

impl AckTable {
    fn insert_unacked(&mut self, connection: ConnectionId) -> bool {
        if self.departed.contains(&connection) {
            trace!("Refusing to track departed connection {}", connection);
            return false;
        }
        if self.acks.contains_key(&connection) {
            return false;
        }
        self.acks.insert(connection, GameTick::ZERO);
        debug!("Tracking acks for connection {}", connection);
        true
    }

    fn min_ack(&self) -> GameTick {
        self.acks.values().copied().min().unwrap_or(GameTick::MAX)
    }
}

#[derive(Debug, Default)]
pub struct AckTracker {
    table: Mutex<AckTable>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a connection at tick zero.
    ///
    /// Returns true if the connection was new. Already tracked connections
    /// keep their recorded ack and removed ones stay removed.
    pub fn register(&self, connection: ConnectionId) -> bool {
        self.table.lock().insert_unacked(connection)
    }

    /// Stops tracking a connection for good.
    ///
    /// Returns false if it was not tracked, which happens routinely when a
    /// disconnect is reported more than once or before the first cycle.
    pub fn remove(&self, connection: ConnectionId) -> bool {
        let mut table = self.table.lock();
        table.departed.insert(connection);
        let removed = table.acks.remove(&connection);
        if let Some(tick) = removed {
            debug!(
                "Stopped tracking acks for connection {} (last ack {})",
                connection, tick
            );
        }
        removed.is_some()
    }

    /// Stores `tick` as the connection's latest ack.
    ///
    /// Overwrites whatever was stored, even a newer tick. Acks for unknown
    /// connections are dropped: under reordering they arrive after the
    /// disconnect or before the first broadcast cycle saw the peer.
    pub fn record_ack(&self, connection: ConnectionId, tick: GameTick) -> bool {
        let mut table = self.table.lock();
        match table.acks.get_mut(&connection) {
            Some(stored) => {
                *stored = tick;
                true
            }
            None => {
                trace!("Ignoring ack {} from untracked connection {}", tick, connection);
                false
            }
        }
    }

    /// Minimum ack across tracked connections, `GameTick::MAX` when none.
    pub fn oldest_ack(&self) -> GameTick {
        self.table.lock().min_ack()
    }

    /// Registers every connection in `connections` and returns the oldest
    /// ack, all under a single lock acquisition.
    ///
    /// `connections` must be a complete listing of the live connections.
    /// Departed ids missing from it can never be listed again, so they are
    /// forgotten here.
    pub fn register_and_compute_oldest<I>(&self, connections: I) -> GameTick
    where
        I: IntoIterator<Item = ConnectionId>,
    {
        let listed: HashSet<ConnectionId> = connections.into_iter().collect();
        let mut table = self.table.lock();
        table.departed.retain(|connection| listed.contains(connection));
        for connection in listed {
            table.insert_unacked(connection);
        }
        table.min_ack()
    }

    pub fn ack_of(&self, connection: ConnectionId) -> Option<GameTick> {
        self.table.lock().acks.get(&connection).copied()
    }

    pub fn len(&self) -> usize {
        self.table.lock().acks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().acks.is_empty()
    }

    #[cfg(test)]
    fn departed_len(&self) -> usize {
        self.table.lock().departed.len()
    }
}
