//! Server network layer handling UDP communications and the tick loop

use crate::client_manager::ClientManager;
use crate::clock::TickClock;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::events::DisconnectEvents;
use crate::protocol::ProtocolHandler;
use crate::replication::ReplicationSystem;
use crate::stores::{Collaborators, Transport};
use crate::world::World;
use bincode::{deserialize, serialize};
use log::{debug, error, info, trace, warn};
use parking_lot::RwLock;
use shared::{ConnectionId, EntityId, GameTick, Packet, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::interval;

/// Clients only ever send small control packets.
const RECEIVE_BUFFER_SIZE: usize = 2048;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: ConnectionId,
        avatar: Option<EntityId>,
    },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Unicast over the server socket, addressed by connection id
///
/// Sends are queued for the sender task and never block the tick loop.
pub struct UdpTransport {
    clients: Arc<RwLock<ClientManager>>,
    outbound: mpsc::UnboundedSender<GameMessage>,
}

impl UdpTransport {
    pub fn new(
        clients: Arc<RwLock<ClientManager>>,
        outbound: mpsc::UnboundedSender<GameMessage>,
    ) -> Self {
        Self { clients, outbound }
    }
}

impl Transport for UdpTransport {
    fn active_connections(&self) -> Vec<ConnectionId> {
        self.clients.read().connection_ids()
    }

    fn send(&self, connection: ConnectionId, packet: &Packet) {
        let Some(addr) = self.clients.read().addr_of(connection) else {
            trace!("Dropping packet for departed connection {}", connection);
            return;
        };

        if let Err(e) = self.outbound.send(GameMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }
}

/// Stops a running server from another task
#[derive(Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Main server coordinating networking, simulation and replication
pub struct Server {
    socket: Arc<UdpSocket>,
    config: ServerConfig,
    clients: Arc<RwLock<ClientManager>>,
    world: World,
    clock: Arc<TickClock>,
    replication: ReplicationSystem,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let socket = UdpSocket::bind(&config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let disconnects = Arc::new(DisconnectEvents::new());
        let clients = Arc::new(RwLock::new(ClientManager::new(
            config.max_clients,
            config.client_timeout,
            Arc::clone(&disconnects),
        )));
        let world = World::new(config.world_seed, config.tile_churn);
        let clock = Arc::new(TickClock::new());

        let collaborators = Collaborators {
            entities: world.entities(),
            players: clients.clone(),
            maps: world.maps(),
            sessions: clients.clone(),
            transport: Arc::new(UdpTransport::new(clients.clone(), game_tx.clone())),
        };
        let replication = ReplicationSystem::start(Arc::clone(&clock), collaborators, disconnects);

        Ok(Server {
            socket: Arc::new(socket),
            config,
            clients,
            world,
            clock,
            replication,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Spawns task that continuously listens for incoming packets
    ///
    /// Acks are applied right here, concurrently with the tick loop; all
    /// other packets go through the main loop.
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();
        let clients = Arc::clone(&self.clients);
        let clock = Arc::clone(&self.clock);
        let protocol = self.replication.protocol();

        tokio::spawn(async move {
            let mut buffer = [0u8; RECEIVE_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[0..len]) {
                        Ok(Packet::Ack { tick }) => {
                            Self::receive_ack(&clients, &clock, &protocol, addr, tick);
                        }
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(_) => {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn receive_ack(
        clients: &RwLock<ClientManager>,
        clock: &TickClock,
        protocol: &ProtocolHandler,
        addr: SocketAddr,
        tick: GameTick,
    ) {
        let client_id = {
            let mut clients = clients.write();
            let client_id = clients.find_client_by_addr(addr);
            if let Some(client_id) = client_id {
                clients.touch(client_id);
            }
            client_id
        };

        let Some(client_id) = client_id else {
            trace!("Ack {} from unknown address {}", tick, addr);
            return;
        };

        let current = clock.current();
        if tick > current {
            warn!(
                "Dropping ack {} from client {}: server is only at {}",
                tick, client_id, current
            );
            return;
        }

        protocol.handle_ack(client_id, tick);
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let Some(mut game_rx) = self.game_rx.take() else {
            warn!("Network sender already running");
            return;
        };

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            match e {
                                ServerError::DatagramTooLarge { .. } => {
                                    warn!("Dropping packet to {}: {}", addr, e)
                                }
                                _ => error!("Failed to send packet to {}: {}", addr, e),
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let check_interval = self.config.timeout_check_interval;

        tokio::spawn(async move {
            let mut interval = interval(check_interval);

            loop {
                interval.tick().await;

                let timed_out = clients.write().check_timeouts();

                for client in timed_out {
                    let message = ServerMessage::ClientTimeout {
                        client_id: client.id,
                        avatar: client.session.attached_entity,
                    };
                    if let Err(e) = server_tx.send(message) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let data = serialize(packet).map_err(|source| ServerError::Encode { addr, source })?;
        if data.len() > MAX_DATAGRAM_SIZE {
            return Err(ServerError::DatagramTooLarge {
                size: data.len(),
                limit: MAX_DATAGRAM_SIZE,
            });
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Removes a client and the avatar it controlled
    fn drop_client(&mut self, client_id: ConnectionId) {
        let removed = self.clients.write().remove_client(&client_id);
        if let Some(entity) = removed.and_then(|client| client.session.attached_entity) {
            self.world.despawn(entity, self.clock.current());
        }
    }

    /// Processes lifecycle packets from clients
    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let tick = self.clock.current();

        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Protocol version mismatch".to_string(),
                        },
                        addr,
                    );
                    return;
                }

                // Remove existing connection if present
                let existing_client_id = self.clients.read().find_client_by_addr(addr);
                if let Some(existing_id) = existing_client_id {
                    info!("Removing existing client {} from {}", existing_id, addr);
                    self.drop_client(existing_id);
                }

                let client_id = self.clients.write().add_client(addr, tick);

                if let Some(client_id) = client_id {
                    let avatar = self.world.spawn_avatar(tick);
                    self.clients.write().attach_entity(client_id, avatar, tick);
                    self.send_packet(Packet::Connected { client_id }, addr);
                } else {
                    self.send_packet(
                        Packet::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    );
                }
            }

            Packet::JoinGame => {
                let mut clients = self.clients.write();
                let joined = clients
                    .find_client_by_addr(addr)
                    .is_some_and(|client_id| clients.join_game(client_id, tick));
                if !joined {
                    warn!("Join request from unknown address {}", addr);
                }
            }

            Packet::Disconnect => {
                let client_id = self.clients.read().find_client_by_addr(addr);
                if let Some(client_id) = client_id {
                    self.drop_client(client_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Advances the simulation one step and replicates the result
    fn run_tick(&mut self, dt: f32) {
        let tick = self.clock.advance();
        self.world.step(dt, tick);
        let outcome = self.replication.broadcast();

        // Periodic monitoring
        if tick.0 % 60 == 0 {
            debug!(
                "{}: {} clients, floor {}, {} entities, {} retained deletions, last cycle {:?}",
                tick,
                self.clients.read().len(),
                self.replication.applied_floor(),
                self.world.entities().len(),
                self.world.entities().retained_deletions(),
                outcome
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), ServerError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.config.tick_duration());
        let mut last_tick = Instant::now();

        info!(
            "Server started at {}Hz with room for {} clients",
            self.config.tick_rate, self.config.max_clients
        );

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr);
                        },
                        Some(ServerMessage::ClientTimeout { client_id, avatar }) => {
                            debug!("Cleaning up after timed out client {}", client_id);
                            if let Some(entity) = avatar {
                                self.world.despawn(entity, self.clock.current());
                            }
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.run_tick(dt);
                },
            }
        }

        self.replication.stop();
        Ok(())
    }
}
