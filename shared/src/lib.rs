use serde::{Deserialize, Serialize};
use std::fmt;

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const ENTITY_SIZE: f32 = 32.0;
pub const ENTITY_SPEED: f32 = 120.0;

pub const MAP_WIDTH: i32 = 25;
pub const MAP_HEIGHT: i32 = 19;

/// Version a client must announce in `Packet::Connect`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest payload that fits in a single UDP datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

pub type ConnectionId = u32;
pub type EntityId = u32;
pub type MapId = u32;

/// Discrete simulation step counter.
///
/// `GameTick::MAX` is reserved as the "infinite" sentinel: it is the value of
/// the oldest ack when nobody is connected and means "no baseline to protect"
/// when handed to a history cull. Real ticks never reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GameTick(pub u32);

impl GameTick {
    pub const ZERO: GameTick = GameTick(0);
    pub const FIRST: GameTick = GameTick(1);
    pub const MAX: GameTick = GameTick(u32::MAX);

    pub fn is_max(self) -> bool {
        self == Self::MAX
    }

    /// Returns the following tick, saturating one below the sentinel.
    pub fn next(self) -> GameTick {
        GameTick(self.0.saturating_add(1).min(u32::MAX - 1))
    }
}

impl fmt::Display for GameTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_max() {
            write!(f, "tick(inf)")
        } else {
            write!(f, "tick({})", self.0)
        }
    }
}

/// Participation state of the player layered over a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Connecting,
    Connected,
    InGame,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: EntityId,
    pub last_modified: GameTick,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

impl EntityState {
    pub fn new(id: EntityId, x: f32, y: f32, tick: GameTick) -> Self {
        Self {
            id,
            last_modified: tick,
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub connection_id: ConnectionId,
    pub name: String,
    pub status: SessionStatus,
    pub attached_entity: Option<EntityId>,
    pub last_modified: GameTick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapDelta {
    TileChanged {
        map_id: MapId,
        x: i32,
        y: i32,
        tile: u16,
        tick: GameTick,
    },
    MapDeleted {
        map_id: MapId,
        tick: GameTick,
    },
}

impl MapDelta {
    pub fn tick(&self) -> GameTick {
        match self {
            MapDelta::TileChanged { tick, .. } | MapDelta::MapDeleted { tick, .. } => *tick,
        }
    }
}

/// Everything that changed in `(from_tick, to_tick]`.
///
/// One snapshot is built per replication cycle and shared by every
/// recipient, so `from_tick` is the oldest ack across all connections rather
/// than the receiving client's own ack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateSnapshot {
    pub from_tick: GameTick,
    pub to_tick: GameTick,
    pub entities: Vec<EntityState>,
    pub players: Vec<PlayerState>,
    pub deletions: Vec<EntityId>,
    pub map_deltas: Vec<MapDelta>,
}

impl GameStateSnapshot {
    #[cfg(test)]
    fn empty(from_tick: GameTick, to_tick: GameTick) -> Self {
        Self {
            from_tick,
            to_tick,
            entities: Vec::new(),
            players: Vec::new(),
            deletions: Vec::new(),
            map_deltas: Vec::new(),
        }
    }

    pub fn change_count(&self) -> usize {
        self.entities.len() + self.players.len() + self.deletions.len() + self.map_deltas.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    Connect { client_version: u32 },
    JoinGame,
    Ack { tick: GameTick },
    Disconnect,

    Connected { client_id: ConnectionId },
    State(GameStateSnapshot),
    Disconnected { reason: String },
}
