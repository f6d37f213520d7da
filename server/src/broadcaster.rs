//! Per-cycle replication driver
//!
//! Each cycle computes one history floor across all connections, culls
//! history below it when it has advanced, builds a single snapshot covering
//! `(floor, current]` and unicasts that same snapshot to every connection
//! whose session is in game. Clients may receive history they already
//! applied; they never miss history they still need.
//!
//! A cycle is not reentrant: `run_cycle` takes `&mut self` and is driven
//! from the server's tick loop only.

use crate::ack_tracker::AckTracker;
use crate::clock::TickClock;
use crate::history::{CullOutcome, HistoryCuller};
use crate::snapshot::SnapshotBuilder;
use crate::stores::{Collaborators, SessionDirectory, Transport};
use log::{debug, trace};
use shared::{GameTick, Packet};
use std::sync::Arc;

/// What a replication cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No connections; retained history was purged.
    Idle,
    /// Connections were listed, but all of them disconnected before they
    /// could be registered, leaving the ack table empty.
    NoFloor,
    Broadcast {
        floor: GameTick,
        culled: bool,
        recipients: usize,
    },
}

pub struct Broadcaster {
    acks: Arc<AckTracker>,
    clock: Arc<TickClock>,
    culler: HistoryCuller,
    snapshots: SnapshotBuilder,
    sessions: Arc<dyn SessionDirectory>,
    transport: Arc<dyn Transport>,
}

impl Broadcaster {
    pub fn new(acks: Arc<AckTracker>, clock: Arc<TickClock>, collaborators: Collaborators) -> Self {
        let Collaborators {
            entities,
            players,
            maps,
            sessions,
            transport,
        } = collaborators;

        Self {
            acks,
            clock,
            culler: HistoryCuller::new(Arc::clone(&entities), Arc::clone(&maps)),
            snapshots: SnapshotBuilder::new(entities, players, maps),
            sessions,
            transport,
        }
    }

    pub fn applied_floor(&self) -> GameTick {
        self.culler.applied_floor()
    }

    pub fn run_cycle(&mut self) -> CycleOutcome {
        let connections = self.transport.active_connections();

        if connections.is_empty() {
            // keep deletions from piling up while nobody is around
            self.culler.cull_to(GameTick::MAX);
            return CycleOutcome::Idle;
        }

        let oldest_ack = self
            .acks
            .register_and_compute_oldest(connections.iter().copied());

        if oldest_ack.is_max() {
            // every listed connection departed after the listing was taken
            return CycleOutcome::NoFloor;
        }

        let culled = matches!(
            self.culler.cull_to(oldest_ack),
            CullOutcome::Advanced { .. }
        );

        let current = self.clock.current();
        let packet = Packet::State(self.snapshots.build(oldest_ack, current));

        let mut recipients = 0;
        for connection in connections {
            let in_game = self
                .sessions
                .lookup_by_connection(connection)
                .is_some_and(|session| session.is_in_game());

            if !in_game {
                trace!("Skipping state for connection {} (not in game)", connection);
                continue;
            }

            self.transport.send(connection, &packet);
            recipients += 1;
        }

        if culled {
            debug!(
                "Cycle at {}: floor {}, sent to {} connection(s)",
                current, oldest_ack, recipients
            );
        }

        CycleOutcome::Broadcast {
            floor: oldest_ack,
            culled,
            recipients,
        }
    }
}
