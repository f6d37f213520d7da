use std::net::SocketAddr;
use thiserror::Error;

/// Errors surfaced by the server runtime.
///
/// The replication cycle itself never fails; these cover the edges around
/// it: sockets, packet encoding and configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind UDP socket to {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket I/O failed")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode packet for {addr}")]
    Encode {
        addr: SocketAddr,
        #[source]
        source: bincode::Error,
    },

    #[error("Packet of {size} bytes exceeds the datagram limit of {limit} bytes")]
    DatagramTooLarge { size: usize, limit: usize },

    #[error("Invalid server configuration: {0}")]
    InvalidConfig(String),
}
