//! Wiring and lifecycle of the replication subsystem

use crate::ack_tracker::AckTracker;
use crate::broadcaster::{Broadcaster, CycleOutcome};
use crate::clock::TickClock;
use crate::events::{DisconnectEvents, ListenerId};
use crate::protocol::ProtocolHandler;
use crate::stores::Collaborators;
use log::info;
use shared::GameTick;
use std::sync::Arc;

/// Owns the ack table and broadcaster for as long as the server runs.
///
/// `start` subscribes the protocol handler to disconnect events and `stop`
/// takes it back out; dropping the system stops it as well.
pub struct ReplicationSystem {
    acks: Arc<AckTracker>,
    protocol: Arc<ProtocolHandler>,
    broadcaster: Broadcaster,
    events: Arc<DisconnectEvents>,
    subscription: Option<ListenerId>,
}

impl ReplicationSystem {
    pub fn start(
        clock: Arc<TickClock>,
        collaborators: Collaborators,
        events: Arc<DisconnectEvents>,
    ) -> Self {
        let acks = Arc::new(AckTracker::new());
        let protocol = Arc::new(ProtocolHandler::new(Arc::clone(&acks)));
        let subscription = events.subscribe(protocol.clone());
        let broadcaster = Broadcaster::new(Arc::clone(&acks), clock, collaborators);

        info!("Replication started");

        Self {
            acks,
            protocol,
            broadcaster,
            events,
            subscription: Some(subscription),
        }
    }

    pub fn protocol(&self) -> Arc<ProtocolHandler> {
        Arc::clone(&self.protocol)
    }

    pub fn acks(&self) -> &AckTracker {
        &self.acks
    }

    pub fn applied_floor(&self) -> GameTick {
        self.broadcaster.applied_floor()
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    /// Runs one replication cycle. Does nothing once stopped.
    pub fn broadcast(&mut self) -> Option<CycleOutcome> {
        if !self.is_running() {
            return None;
        }
        Some(self.broadcaster.run_cycle())
    }

    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.events.unsubscribe(subscription);
            info!("Replication stopped");
        }
    }
}

impl Drop for ReplicationSystem {
    fn drop(&mut self) {
        self.stop();
    }
}
