//! Performance benchmarks for the replication hot paths

use bincode::serialize;
use parking_lot::{Mutex, RwLock};
use server::client_manager::ClientManager;
use server::events::DisconnectEvents;
use server::stores::{Collaborators, Transport};
use server::world::{EntityHistory, MapHistory, MAIN_MAP};
use server::{AckTracker, Broadcaster, SnapshotBuilder, TickClock};
use shared::{ConnectionId, GameTick, Packet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Transport that only counts sends
struct CountingTransport {
    clients: Arc<RwLock<ClientManager>>,
    sends: Mutex<usize>,
}

impl Transport for CountingTransport {
    fn active_connections(&self) -> Vec<ConnectionId> {
        self.clients.read().connection_ids()
    }

    fn send(&self, _connection: ConnectionId, _packet: &Packet) {
        *self.sends.lock() += 1;
    }
}

fn populated_stores(entity_count: u32) -> (Arc<EntityHistory>, Arc<MapHistory>) {
    let entities = Arc::new(EntityHistory::new());
    let maps = Arc::new(MapHistory::new());
    for i in 0..entity_count {
        let tick = GameTick(1 + i % 50);
        entities.spawn(i as f32, i as f32, 1.0, 1.0, tick);
        maps.set_tile(MAIN_MAP, (i % 25) as i32, (i / 25 % 19) as i32, 1, tick);
    }
    (entities, maps)
}

/// Benchmarks oldest-ack computation with many connections
#[test]
fn benchmark_oldest_ack() {
    let tracker = AckTracker::new();
    for connection in 0..1_000 {
        tracker.register(connection);
        tracker.record_ack(connection, GameTick(100 + connection));
    }

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = tracker.oldest_ack();
    }

    let duration = start.elapsed();
    println!(
        "Oldest ack over 1000 connections: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(tracker.oldest_ack(), GameTick(100));
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks ack recording from many concurrent threads
#[test]
fn benchmark_concurrent_ack_recording() {
    let tracker = Arc::new(AckTracker::new());
    for connection in 0..256 {
        tracker.register(connection);
    }

    let start = Instant::now();
    let handles: Vec<_> = (0..8u32)
        .map(|worker| {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                for round in 0..5_000u32 {
                    let connection = worker * 32 + round % 32;
                    tracker.record_ack(connection, GameTick(round));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let duration = start.elapsed();
    println!("Concurrent ack recording: 40000 acks in {:?}", duration);

    assert_eq!(tracker.len(), 256);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks a full broadcast cycle with a populated world
#[test]
fn benchmark_broadcast_cycle() {
    let (entities, maps) = populated_stores(500);
    let events = Arc::new(DisconnectEvents::new());
    let clients = Arc::new(RwLock::new(ClientManager::new(
        64,
        Duration::from_secs(5),
        events,
    )));
    for port in 0..32u16 {
        let addr: SocketAddr = format!("127.0.0.1:{}", 5000 + port).parse().unwrap();
        let mut roster = clients.write();
        let id = roster.add_client(addr, GameTick(1)).unwrap();
        roster.join_game(id, GameTick(1));
    }

    let transport = Arc::new(CountingTransport {
        clients: clients.clone(),
        sends: Mutex::new(0),
    });
    let acks = Arc::new(AckTracker::new());
    let clock = Arc::new(TickClock::starting_at(GameTick(60)));
    let mut broadcaster = Broadcaster::new(
        acks.clone(),
        clock.clone(),
        Collaborators {
            entities,
            players: clients.clone(),
            maps,
            sessions: clients.clone(),
            transport: transport.clone(),
        },
    );

    let iterations = 200;
    let start = Instant::now();

    for i in 0..iterations {
        let tick = clock.advance();
        broadcaster.run_cycle();
        // every client acks a little behind the clock
        for connection in clients.read().connection_ids() {
            acks.record_ack(connection, GameTick(tick.0 - 1 - (i % 3)));
        }
    }

    let duration = start.elapsed();
    println!(
        "Broadcast cycle (500 entities, 32 clients): {} iterations in {:?} ({:.2} ms/iter)",
        iterations,
        duration,
        duration.as_millis() as f64 / iterations as f64
    );

    assert_eq!(*transport.sends.lock(), iterations as usize * 32);
    // Should complete in under 5 seconds
    assert!(duration.as_secs() < 5);
}

/// Benchmarks snapshot construction and serialization
#[test]
fn benchmark_snapshot_serialization() {
    let (entities, maps) = populated_stores(1_000);
    let clients = Arc::new(RwLock::new(ClientManager::new(
        4,
        Duration::from_secs(5),
        Arc::new(DisconnectEvents::new()),
    )));
    let builder = SnapshotBuilder::new(entities, clients, maps);

    let iterations = 500;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        let snapshot = builder.build(GameTick::ZERO, GameTick(60));
        bytes = serialize(&Packet::State(snapshot)).unwrap().len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot build + serialize: {} iterations in {:?}, {} bytes each",
        iterations, duration, bytes
    );

    assert!(bytes < shared::MAX_DATAGRAM_SIZE);
    assert!(duration.as_secs() < 5);
}
