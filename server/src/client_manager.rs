//! Connection roster for the replication server
//!
//! This module handles the server-side bookkeeping of connected peers:
//! - Connection lifecycle (connect, join, disconnect, timeout)
//! - Session state layered over each connection
//! - Capacity limits and address lookup for inbound datagrams
//! - Disconnect notification for every removal path
//!
//! Connection ids are handed out once and never reused, so a peer that
//! reconnects from the same address comes back as a new connection.

use crate::events::DisconnectEvents;
use crate::session::Session;
use crate::stores::{PlayerStore, SessionDirectory};
use log::info;
use parking_lot::RwLock;
use shared::{ConnectionId, EntityId, GameTick, PlayerState, SessionStatus};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A connected peer and its session
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Player participation state
    pub session: Session,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr, tick: GameTick) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            session: Session::new(id, tick),
        }
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Removal always goes through `remove_client`, which fires the disconnect
/// notification so subscribers (the ack table among them) never keep state
/// for a connection that is gone.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<ConnectionId, Client>,
    /// Next available client ID for new connections
    next_client_id: ConnectionId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    /// Silence after which a client is considered gone
    timeout: Duration,
    disconnects: Arc<DisconnectEvents>,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration, disconnects: Arc<DisconnectEvents>) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
            disconnects,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, tick: GameTick) -> Option<ConnectionId> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr, tick));

        Some(client_id)
    }

    /// Removes a client and notifies disconnect listeners
    ///
    /// Returns the removed client, or None if they were already gone.
    pub fn remove_client(&mut self, client_id: &ConnectionId) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        info!("Client {} disconnected", client.id);
        self.disconnects.notify(client.id);
        Some(client)
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ConnectionId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn addr_of(&self, client_id: ConnectionId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Marks the client as recently heard from
    pub fn touch(&mut self, client_id: ConnectionId) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Moves the client's session in game. Returns false for unknown clients.
    pub fn join_game(&mut self, client_id: ConnectionId, tick: GameTick) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.last_seen = Instant::now();
                if !client.session.is_in_game() {
                    client.session.set_status(SessionStatus::InGame, tick);
                    info!("Client {} joined the game", client_id);
                }
                true
            }
            None => false,
        }
    }

    pub fn attach_entity(&mut self, client_id: ConnectionId, entity: EntityId, tick: GameTick) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.session.attach(entity, tick);
                true
            }
            None => false,
        }
    }

    pub fn session(&self, client_id: ConnectionId) -> Option<&Session> {
        self.clients.get(&client_id).map(|client| &client.session)
    }

    /// Removes clients that have been silent past the timeout
    ///
    /// Returns the removed clients so the caller can clean up game state
    /// that belonged to them.
    pub fn check_timeouts(&mut self) -> Vec<Client> {
        let timed_out: Vec<ConnectionId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(self.timeout))
            .map(|(id, _)| *id)
            .collect();

        timed_out
            .iter()
            .filter_map(|client_id| {
                info!("Client {} timed out", client_id);
                self.remove_client(client_id)
            })
            .collect()
    }

    /// IDs of every connected client, in ascending order
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn player_states_since(&self, tick: GameTick) -> Vec<PlayerState> {
        let mut states: Vec<PlayerState> = self
            .clients
            .values()
            .filter(|client| client.session.last_modified > tick)
            .map(|client| client.session.to_player_state())
            .collect();
        states.sort_unstable_by_key(|state| state.connection_id);
        states
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl SessionDirectory for RwLock<ClientManager> {
    fn lookup_by_connection(&self, connection: ConnectionId) -> Option<Session> {
        self.read().session(connection).cloned()
    }
}

impl PlayerStore for RwLock<ClientManager> {
    fn states_since(&self, tick: GameTick) -> Vec<PlayerState> {
        self.read().player_states_since(tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DisconnectListener;
    use parking_lot::Mutex;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn manager(max_clients: usize) -> ClientManager {
        ClientManager::new(
            max_clients,
            Duration::from_secs(5),
            Arc::new(DisconnectEvents::new()),
        )
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ConnectionId>>,
    }

    impl DisconnectListener for Recorder {
        fn on_disconnect(&self, connection: ConnectionId) {
            self.seen.lock().push(connection);
        }
    }

    #[test]
    fn test_client_creation() {
        let addr = test_addr();
        let client = Client::new(1, addr, GameTick(4));

        assert_eq!(client.id, 1);
        assert_eq!(client.addr, addr);
        assert_eq!(client.session.status, SessionStatus::Connected);
        assert_eq!(client.session.last_modified, GameTick(4));
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(1, test_addr(), GameTick::FIRST);

        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);

        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_multiple_clients() {
        let mut manager = manager(3);

        let client_id1 = manager.add_client(test_addr(), GameTick::FIRST).unwrap();
        let client_id2 = manager.add_client(test_addr2(), GameTick::FIRST).unwrap();

        assert_eq!(client_id1, 1);
        assert_eq!(client_id2, 2);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.connection_ids(), vec![1, 2]);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = manager(1);

        assert!(manager.add_client(test_addr(), GameTick::FIRST).is_some());
        assert!(manager.add_client(test_addr2(), GameTick::FIRST).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client_notifies_listeners() {
        let events = Arc::new(DisconnectEvents::new());
        let recorder = Arc::new(Recorder::default());
        events.subscribe(recorder.clone());
        let mut manager = ClientManager::new(2, Duration::from_secs(5), events);

        let client_id = manager.add_client(test_addr(), GameTick::FIRST).unwrap();
        let removed = manager.remove_client(&client_id);

        assert_eq!(removed.map(|c| c.id), Some(client_id));
        assert!(manager.is_empty());
        assert_eq!(*recorder.seen.lock(), vec![client_id]);
    }

    #[test]
    fn test_remove_nonexistent_client_is_silent() {
        let events = Arc::new(DisconnectEvents::new());
        let recorder = Arc::new(Recorder::default());
        events.subscribe(recorder.clone());
        let mut manager = ClientManager::new(2, Duration::from_secs(5), events);

        assert!(manager.remove_client(&999).is_none());
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn test_ids_are_not_reused_after_reconnect() {
        let mut manager = manager(2);
        let first = manager.add_client(test_addr(), GameTick::FIRST).unwrap();
        manager.remove_client(&first);
        let second = manager.add_client(test_addr(), GameTick::FIRST).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = manager(2);
        let client_id1 = manager.add_client(test_addr(), GameTick::FIRST).unwrap();
        manager.add_client(test_addr2(), GameTick::FIRST).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(client_id1));
        assert_eq!(manager.addr_of(client_id1), Some(test_addr()));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_join_game() {
        let mut manager = manager(2);
        let client_id = manager.add_client(test_addr(), GameTick::FIRST).unwrap();

        assert!(!manager.session(client_id).unwrap().is_in_game());
        assert!(manager.join_game(client_id, GameTick(6)));
        assert!(manager.session(client_id).unwrap().is_in_game());
        assert!(!manager.join_game(42, GameTick(6)));
    }

    #[test]
    fn test_check_timeouts_removes_and_notifies() {
        let events = Arc::new(DisconnectEvents::new());
        let recorder = Arc::new(Recorder::default());
        events.subscribe(recorder.clone());
        let mut manager = ClientManager::new(2, Duration::from_secs(1), events);

        let stale = manager.add_client(test_addr(), GameTick::FIRST).unwrap();
        let fresh = manager.add_client(test_addr2(), GameTick::FIRST).unwrap();
        manager.clients.get_mut(&stale).unwrap().last_seen =
            Instant::now() - Duration::from_secs(3);

        let removed = manager.check_timeouts();

        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, stale);
        assert_eq!(manager.connection_ids(), vec![fresh]);
        assert_eq!(*recorder.seen.lock(), vec![stale]);
    }

    #[test]
    fn test_session_directory_and_player_store() {
        let roster = RwLock::new(manager(2));
        let client_id = roster.write().add_client(test_addr(), GameTick(2)).unwrap();
        roster.write().attach_entity(client_id, 11, GameTick(3));
        roster.write().join_game(client_id, GameTick(5));

        let session = roster.lookup_by_connection(client_id).unwrap();
        assert!(session.is_in_game());
        assert_eq!(session.attached_entity, Some(11));
        assert!(roster.lookup_by_connection(99).is_none());

        assert_eq!(roster.states_since(GameTick(4)).len(), 1);
        assert!(roster.states_since(GameTick(5)).is_empty());
    }
}
