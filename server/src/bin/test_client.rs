//! Headless client that connects, joins and acknowledges every snapshot.
//!
//! Useful for watching the server's history floor move without a renderer.

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{debug, info, warn};
use shared::{Packet, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// How long to stay connected
    #[arg(short = 'd', long, default_value = "10")]
    duration_secs: u64,

    /// Stay in the connected state without joining the game
    #[arg(long)]
    skip_join: bool,
}

async fn send(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    socket.send_to(&serialize(packet)?, addr).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let server_addr = args.server.parse::<SocketAddr>()?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!("Client socket bound to {}", socket.local_addr()?);

    send(
        &socket,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
        },
        server_addr,
    )
    .await?;

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let deadline = Instant::now() + Duration::from_secs(args.duration_secs);
    let mut snapshots = 0u32;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        let (len, _) = match timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(result) => result?,
            Err(_) => break,
        };

        let packet = match deserialize::<Packet>(&buf[..len]) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Failed to deserialize packet: {}", e);
                continue;
            }
        };

        match packet {
            Packet::Connected { client_id } => {
                info!("Connected with client ID {}", client_id);
                if !args.skip_join {
                    send(&socket, &Packet::JoinGame, server_addr).await?;
                }
            }
            Packet::State(snapshot) => {
                snapshots += 1;
                debug!(
                    "Snapshot ({}, {}]: {} changes in {} bytes",
                    snapshot.from_tick,
                    snapshot.to_tick,
                    snapshot.change_count(),
                    len
                );
                send(
                    &socket,
                    &Packet::Ack {
                        tick: snapshot.to_tick,
                    },
                    server_addr,
                )
                .await?;
            }
            Packet::Disconnected { reason } => {
                warn!("Server disconnected us: {}", reason);
                return Ok(());
            }
            other => warn!("Unexpected packet from server: {:?}", other),
        }
    }

    info!("Received {} snapshots, disconnecting", snapshots);
    send(&socket, &Packet::Disconnect, server_addr).await?;

    Ok(())
}
