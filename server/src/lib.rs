//! # Replication Server Library
//!
//! This library provides the authoritative server side of delta state
//! replication. Every tick it sends each in-game client one snapshot holding
//! everything that changed since the oldest tick any connected client has
//! acknowledged, and it discards history that every client already has.
//!
//! ## Core Responsibilities
//!
//! ### Acknowledgment Tracking
//! Clients report the last tick they fully applied. The server keeps the
//! latest report per connection and derives the oldest ack across all of
//! them. That oldest ack is the history floor: anything at or below it has
//! reached every client.
//!
//! ### History Culling
//! Change records (entity updates, entity deletions, map tile changes, map
//! deletions) are retained until the floor passes them. Culling happens only
//! when the floor advances; with nobody connected all history is purged.
//!
//! ### State Broadcasting
//! One snapshot covering `(floor, current]` is built per cycle and unicast
//! to every connection whose session is in game. Clients discard the parts
//! they already applied.
//!
//! ## Architecture Design
//!
//! ### Shared Replication Core
//! The replication components are synchronous and guard their state with
//! `parking_lot` locks. The tick loop drives broadcasting while the network
//! receive task applies acks concurrently; disconnects arrive through a
//! subscription registry owned by the client roster.
//!
//! ### UDP-Based Communication
//! Uses UDP sockets for all traffic. State snapshots are redundant by
//! construction, so a lost datagram only delays the next ack rather than
//! losing data.
//!
//! ## Module Organization
//!
//! ### Replication Modules
//! - `ack_tracker`: per-connection ack table and oldest-ack computation
//! - `history`: floor bookkeeping and culling of the change stores
//! - `snapshot`: assembly of `GameStateSnapshot` from the stores
//! - `broadcaster`: the per-cycle driver tying the above together
//! - `protocol`: inbound acks and disconnects
//! - `replication`: lifecycle wiring of the above
//! - `clock`: the shared tick counter
//!
//! ### Collaborator Modules
//! - `stores`: traits the replication core reads and culls through
//! - `world`: in-memory entity and map stores with a small demo simulation
//! - `client_manager` and `session`: connection roster and session state
//! - `events`: disconnect notification registry
//!
//! ### Runtime Modules
//! - `network`: UDP transport, lifecycle packets and the tick loop
//! - `config` and `error`: server settings and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".to_string(),
//!         tick_rate: 30,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Runs until the process is interrupted:
//!     // - Accepts connections and join requests
//!     // - Applies client acks as they arrive
//!     // - Steps the world and broadcasts delta snapshots every tick
//!     // - Drops clients that go silent
//!     let mut server = Server::new(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The server uses an event-driven architecture with internal async tasks that handle:
//! - **Network Receiver**: Listens for packets and applies acks directly
//! - **Network Sender**: Serializes and sends the outgoing packet queue
//! - **Timeout Checker**: Removes connections that stopped talking
//! - **Main Loop**: Handles lifecycle packets, steps the world and replicates

pub mod ack_tracker;
pub mod broadcaster;
pub mod client_manager;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod network;
pub mod protocol;
pub mod replication;
pub mod session;
pub mod snapshot;
pub mod stores;
pub mod world;

#[cfg(test)]
mod test_support;

pub use ack_tracker::AckTracker;
pub use broadcaster::{Broadcaster, CycleOutcome};
pub use clock::TickClock;
pub use config::ServerConfig;
pub use error::ServerError;
pub use history::{CullOutcome, HistoryCuller};
pub use replication::ReplicationSystem;
pub use snapshot::SnapshotBuilder;
