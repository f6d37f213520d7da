//! Player session layered over a connection.

use shared::{ConnectionId, EntityId, GameTick, PlayerState, SessionStatus};

/// Player participation state for one connection.
///
/// A connection exists as soon as the peer is accepted; the session only
/// reaches `InGame` once the client asks to join. Replication state is sent
/// to `InGame` sessions only.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub name: String,
    pub status: SessionStatus,
    pub attached_entity: Option<EntityId>,
    /// Tick of the last change players should hear about.
    pub last_modified: GameTick,
}

impl Session {
    pub fn new(connection_id: ConnectionId, tick: GameTick) -> Self {
        Self {
            connection_id,
            name: format!("Player {}", connection_id),
            status: SessionStatus::Connected,
            attached_entity: None,
            last_modified: tick,
        }
    }

    pub fn is_in_game(&self) -> bool {
        self.status == SessionStatus::InGame
    }

    pub fn set_status(&mut self, status: SessionStatus, tick: GameTick) {
        if self.status != status {
            self.status = status;
            self.last_modified = tick;
        }
    }

    pub fn attach(&mut self, entity: EntityId, tick: GameTick) {
        self.attached_entity = Some(entity);
        self.last_modified = tick;
    }

    pub fn to_player_state(&self) -> PlayerState {
        PlayerState {
            connection_id: self.connection_id,
            name: self.name.clone(),
            status: self.status,
            attached_entity: self.attached_entity,
            last_modified: self.last_modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_not_in_game() {
        let session = Session::new(4, GameTick(3));
        assert_eq!(session.status, SessionStatus::Connected);
        assert!(!session.is_in_game());
        assert_eq!(session.name, "Player 4");
        assert_eq!(session.last_modified, GameTick(3));
    }

    #[test]
    fn test_status_change_marks_session_dirty() {
        let mut session = Session::new(1, GameTick(3));
        session.set_status(SessionStatus::InGame, GameTick(8));
        assert!(session.is_in_game());
        assert_eq!(session.last_modified, GameTick(8));

        // same status again leaves the stamp alone
        session.set_status(SessionStatus::InGame, GameTick(12));
        assert_eq!(session.last_modified, GameTick(8));
    }

    #[test]
    fn test_player_state_mirrors_session() {
        let mut session = Session::new(2, GameTick(1));
        session.attach(17, GameTick(2));
        let state = session.to_player_state();
        assert_eq!(state.connection_id, 2);
        assert_eq!(state.attached_entity, Some(17));
        assert_eq!(state.last_modified, GameTick(2));
    }
}
