//! Capabilities the replication core consumes but does not own.
//!
//! Every method takes `&self`; implementations provide their own locking so
//! the broadcast cycle can query them without coordinating with writers.

use crate::session::Session;
use shared::{ConnectionId, EntityId, EntityState, GameTick, MapDelta, Packet, PlayerState};
use std::sync::Arc;

pub trait EntityStore: Send + Sync {
    /// Entities modified after `tick`.
    fn deltas_since(&self, tick: GameTick) -> Vec<EntityState>;
    /// Entities deleted after `tick` whose deletion is still retained.
    fn deleted_since(&self, tick: GameTick) -> Vec<EntityId>;
    /// Discards retained history strictly below `tick`.
    fn cull_before(&self, tick: GameTick);
}

pub trait PlayerStore: Send + Sync {
    fn states_since(&self, tick: GameTick) -> Vec<PlayerState>;
}

pub trait MapStore: Send + Sync {
    fn deltas_since(&self, tick: GameTick) -> Vec<MapDelta>;
    fn cull_before(&self, tick: GameTick);
}

pub trait SessionDirectory: Send + Sync {
    fn lookup_by_connection(&self, connection: ConnectionId) -> Option<Session>;
}

pub trait Transport: Send + Sync {
    fn active_connections(&self) -> Vec<ConnectionId>;
    /// Fire-and-forget unicast; failures are not reported back.
    fn send(&self, connection: ConnectionId, packet: &Packet);
}

/// Handles to everything a replication cycle talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub entities: Arc<dyn EntityStore>,
    pub players: Arc<dyn PlayerStore>,
    pub maps: Arc<dyn MapStore>,
    pub sessions: Arc<dyn SessionDirectory>,
    pub transport: Arc<dyn Transport>,
}
