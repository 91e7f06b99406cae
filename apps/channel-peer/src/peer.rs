//! Server accept loop and one-shot client

use std::net::{SocketAddr, ToSocketAddrs};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use net_transport::{TcpAcceptor, TcpTransport};
use secure_channel::{ChannelConfig, ChannelError, Role, establish};
use tracing::{error, info, warn};

use crate::cli::SERVER_REPLY;

/// Pause after a failed accept before trying again
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections until `limit` have been handled, or forever.
///
/// Each connection gets its own thread with its own handshake and key, so
/// one failing peer never affects another.
pub fn serve(acceptor: TcpAcceptor, config: ChannelConfig, limit: Option<usize>) -> anyhow::Result<()> {
    info!("Server listening on {}", acceptor.local_addr()?);

    let mut workers = Vec::new();
    let mut accepted = 0usize;

    while limit.is_none_or(|max| accepted < max) {
        let transport = match acceptor.accept() {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Accept failed: {}", e);
                thread::sleep(ACCEPT_BACKOFF);
                continue;
            }
        };
        accepted += 1;

        reap_finished(&mut workers);

        let config = config.clone();
        workers.push(thread::spawn(move || {
            let peer = transport.peer_addr();
            if let Err(e) = handle_connection(transport, config) {
                error!(%peer, "Connection failed: {}", e);
            }
        }));
    }

    for worker in workers {
        let _ = worker.join();
    }
    Ok(())
}

/// Drop handles of connection threads that have already exited
fn reap_finished(workers: &mut Vec<JoinHandle<()>>) {
    workers.retain(|worker| !worker.is_finished());
}

/// Handshake as initiator, answer one message, close
fn handle_connection(transport: TcpTransport, config: ChannelConfig) -> Result<(), ChannelError> {
    info!("Connected by {}", transport.peer_addr());

    let mut channel = establish(transport, Role::Initiator, config)?;
    let request = channel.receive()?;
    info!(
        session = %channel.session_id().short(),
        "Received securely: {}",
        String::from_utf8_lossy(&request)
    );

    channel.send(SERVER_REPLY.as_bytes())?;
    channel.close();
    Ok(())
}

/// Handshake as responder, send `message` and return the decrypted reply
pub fn run_client(addr: &str, message: &str, config: ChannelConfig) -> anyhow::Result<String> {
    let addr = resolve(addr)?;
    let transport = TcpTransport::connect(addr, config.read_timeout())
        .with_context(|| format!("connecting to {addr}"))?;

    let mut channel = establish(transport, Role::Responder, config)?;
    channel.send(message.as_bytes())?;
    info!("Sent encrypted message ({} bytes)", message.len());

    let reply = channel.receive()?;
    channel.close();

    Ok(String::from_utf8_lossy(&reply).into_owned())
}

fn resolve(addr: &str) -> anyhow::Result<SocketAddr> {
    addr.to_socket_addrs()
        .with_context(|| format!("resolving {addr}"))?
        .next()
        .with_context(|| format!("no address for {addr}"))
}
