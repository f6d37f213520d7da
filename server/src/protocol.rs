//! Inbound replication messages and connection teardown

use crate::ack_tracker::AckTracker;
use crate::events::DisconnectListener;
use log::trace;
use shared::{ConnectionId, GameTick};
use std::sync::Arc;

/// Applies acks and disconnects to the ack table.
///
/// Safe to call from any task; the ack table does its own locking.
pub struct ProtocolHandler {
    acks: Arc<AckTracker>,
}

impl ProtocolHandler {
    pub fn new(acks: Arc<AckTracker>) -> Self {
        Self { acks }
    }

    pub fn handle_ack(&self, connection: ConnectionId, tick: GameTick) {
        if self.acks.record_ack(connection, tick) {
            trace!("Connection {} acked {}", connection, tick);
        }
    }

    pub fn handle_disconnect(&self, connection: ConnectionId) {
        self.acks.remove(connection);
    }
}

impl DisconnectListener for ProtocolHandler {
    fn on_disconnect(&self, connection: ConnectionId) {
        self.handle_disconnect(connection);
    }
}
