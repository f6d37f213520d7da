//! Recording fakes for the collaborator traits.

use crate::session::Session;
use crate::stores::{Collaborators, EntityStore, MapStore, PlayerStore, SessionDirectory, Transport};
use parking_lot::Mutex;
use shared::{
    ConnectionId, EntityId, EntityState, GameTick, MapDelta, Packet, PlayerState, SessionStatus,
};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct FakeEntities {
    pub entities: Mutex<Vec<EntityState>>,
    pub deletions: Mutex<Vec<(EntityId, GameTick)>>,
    pub culls: Mutex<Vec<GameTick>>,
    pub queries: Mutex<Vec<GameTick>>,
}

impl EntityStore for FakeEntities {
    fn deltas_since(&self, tick: GameTick) -> Vec<EntityState> {
        self.queries.lock().push(tick);
        self.entities
            .lock()
            .iter()
            .filter(|entity| entity.last_modified > tick)
            .cloned()
            .collect()
    }

    fn deleted_since(&self, tick: GameTick) -> Vec<EntityId> {
        self.deletions
            .lock()
            .iter()
            .filter(|(_, deleted_at)| *deleted_at > tick)
            .map(|(id, _)| *id)
            .collect()
    }

    fn cull_before(&self, tick: GameTick) {
        self.culls.lock().push(tick);
        self.deletions.lock().retain(|(_, deleted_at)| *deleted_at >= tick);
    }
}

#[derive(Default)]
pub struct FakeMaps {
    pub deltas: Mutex<Vec<MapDelta>>,
    pub culls: Mutex<Vec<GameTick>>,
}

impl MapStore for FakeMaps {
    fn deltas_since(&self, tick: GameTick) -> Vec<MapDelta> {
        self.deltas
            .lock()
            .iter()
            .filter(|delta| delta.tick() > tick)
            .cloned()
            .collect()
    }

    fn cull_before(&self, tick: GameTick) {
        self.culls.lock().push(tick);
    }
}

#[derive(Default)]
pub struct FakePlayers {
    pub states: Mutex<Vec<PlayerState>>,
}

impl PlayerStore for FakePlayers {
    fn states_since(&self, tick: GameTick) -> Vec<PlayerState> {
        self.states
            .lock()
            .iter()
            .filter(|state| state.last_modified > tick)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub struct FakeSessions {
    pub sessions: Mutex<HashMap<ConnectionId, Session>>,
}

impl FakeSessions {
    pub fn set(&self, connection: ConnectionId, status: SessionStatus) {
        let mut session = Session::new(connection, GameTick::FIRST);
        session.status = status;
        self.sessions.lock().insert(connection, session);
    }
}

impl SessionDirectory for FakeSessions {
    fn lookup_by_connection(&self, connection: ConnectionId) -> Option<Session> {
        self.sessions.lock().get(&connection).cloned()
    }
}

#[derive(Default)]
pub struct FakeTransport {
    pub connections: Mutex<Vec<ConnectionId>>,
    pub sent: Mutex<Vec<(ConnectionId, Packet)>>,
}

impl FakeTransport {
    pub fn connect(&self, connection: ConnectionId) {
        self.connections.lock().push(connection);
    }

    pub fn disconnect(&self, connection: ConnectionId) {
        self.connections.lock().retain(|c| *c != connection);
    }

    pub fn recipients(&self) -> Vec<ConnectionId> {
        self.sent.lock().iter().map(|(c, _)| *c).collect()
    }
}

impl Transport for FakeTransport {
    fn active_connections(&self) -> Vec<ConnectionId> {
        self.connections.lock().clone()
    }

    fn send(&self, connection: ConnectionId, packet: &Packet) {
        self.sent.lock().push((connection, packet.clone()));
    }
}

#[derive(Default)]
pub struct Fakes {
    pub entities: Arc<FakeEntities>,
    pub players: Arc<FakePlayers>,
    pub maps: Arc<FakeMaps>,
    pub sessions: Arc<FakeSessions>,
    pub transport: Arc<FakeTransport>,
}

impl Fakes {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            entities: self.entities.clone(),
            players: self.players.clone(),
            maps: self.maps.clone(),
            sessions: self.sessions.clone(),
            transport: self.transport.clone(),
        }
    }
}
