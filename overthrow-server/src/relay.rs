//! The TCP relay (`spec.md` §4.4): a strictly-transport broadcaster that
//! assigns numeric addresses, forwards envelopes, and synthesizes a
//! DISCONNECT notice to the referee on endpoint loss.
//!
//! Grounded in the teacher's `dispatcher.rs` (a single task owns all
//! shared state and talks to per-connection tasks over channels, never a
//! lock) and in `examples/original_source/src/server/server.py` (one
//! thread per connection, a short read timeout so a shutdown signal can be
//! observed, and disconnection broadcast as a synthesized message).

use overthrow_types::wire::{Addr, Envelope, split_lines};
use std::collections::HashMap;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// The referee (address 0) plus up to six players, per `spec.md` §3's
/// `players` invariant (`size in [2, 6]`).
pub const MAX_CONNECTIONS: usize = 7;
pub const REFEREE_ADDR: Addr = 0;
const READ_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A relay-native signal sent once to a newly registered connection so it
/// learns its own assigned address. Not part of the game-message grammar
/// (the relay never interprets game messages), but synthesized the same
/// way DISCONNECT is, since there is no other way for an endpoint to
/// learn the id the relay just gave it.
pub const WELCOME: &str = "WELCOME";
pub const DISCONNECT: &str = "DISCONNECT";

enum RelayEvent {
    Connect {
        outbound: mpsc::UnboundedSender<String>,
        assigned: oneshot::Sender<Option<Addr>>,
    },
    Envelope {
        from: Addr,
        envelope: Envelope,
    },
    Disconnected {
        addr: Addr,
    },
}

/// Runs the relay's accept loop and central router until the listener
/// itself errors out. Each accepted connection gets its own reader task
/// feeding `RelayEvent`s into one single-threaded router loop below, so
/// the address table and outbox map are touched from exactly one place.
pub async fn run(listener: TcpListener) -> Result<(), RelayError> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<RelayEvent>();

    let accept_tx = event_tx.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "relay accepted connection");
                    tokio::spawn(handle_connection(stream, accept_tx.clone()));
                }
                Err(err) => {
                    warn!(%err, "relay accept failed");
                }
            }
        }
    });

    let mut outboxes: HashMap<Addr, mpsc::UnboundedSender<String>> = HashMap::new();
    let mut next_addr: Addr = 0;

    while let Some(event) = event_rx.recv().await {
        match event {
            RelayEvent::Connect { outbound, assigned } => {
                if outboxes.len() >= MAX_CONNECTIONS {
                    warn!("relay at capacity, rejecting connection");
                    let _ = assigned.send(None);
                    continue;
                }
                let addr = next_addr;
                next_addr += 1;
                info!(addr, "relay assigned address");
                let welcome = Envelope::Single {
                    addr,
                    payload: format!("{WELCOME} {addr}"),
                }
                .serialize();
                let _ = outbound.send(welcome);
                outboxes.insert(addr, outbound);
                let _ = assigned.send(Some(addr));
            }
            RelayEvent::Envelope { from, envelope } => {
                route(&outboxes, from, envelope);
            }
            RelayEvent::Disconnected { addr } => {
                outboxes.remove(&addr);
                info!(addr, "relay endpoint disconnected");
                if let Some(referee) = outboxes.get(&REFEREE_ADDR) {
                    let payload = Envelope::Single {
                        addr,
                        payload: DISCONNECT.to_string(),
                    }
                    .serialize();
                    let _ = referee.send(payload);
                }
            }
        }
    }

    Ok(())
}

fn route(outboxes: &HashMap<Addr, mpsc::UnboundedSender<String>>, from: Addr, envelope: Envelope) {
    match envelope {
        Envelope::Single { addr, payload } => {
            if let Some(tx) = outboxes.get(&addr) {
                let _ = tx.send(Envelope::Single { addr: from, payload }.serialize());
            }
        }
        Envelope::Except { addr: excluded, payload } => {
            for (&id, tx) in outboxes.iter() {
                if id != excluded {
                    let _ = tx.send(
                        Envelope::Single {
                            addr: from,
                            payload: payload.clone(),
                        }
                        .serialize(),
                    );
                }
            }
        }
        Envelope::All { payload } => {
            for (&id, tx) in outboxes.iter() {
                if id != from {
                    let _ = tx.send(
                        Envelope::Single {
                            addr: from,
                            payload: payload.clone(),
                        }
                        .serialize(),
                    );
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, events: mpsc::UnboundedSender<RelayEvent>) {
    let (mut reader, mut writer) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let (assigned_tx, assigned_rx) = oneshot::channel();

    if events
        .send(RelayEvent::Connect {
            outbound: outbound_tx,
            assigned: assigned_tx,
        })
        .is_err()
    {
        return;
    }

    let Ok(Some(addr)) = assigned_rx.await else {
        return;
    };

    let writer_task = tokio::spawn(async move {
        while let Some(line) = outbound_rx.recv().await {
            if writer.write_all(format!("{line}\n").as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut buf = String::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
                for line in split_lines(&mut buf) {
                    if line.is_empty() {
                        continue;
                    }
                    match Envelope::parse(&line) {
                        Ok(envelope) => {
                            if events
                                .send(RelayEvent::Envelope { from: addr, envelope })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(err) => warn!(addr, %err, "relay dropped malformed envelope"),
                    }
                }
            }
        }
    }

    let _ = events.send(RelayEvent::Disconnected { addr });
    writer_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn two_connections_get_sequential_addresses_and_exchange_envelopes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(run(listener));

        let mut referee = TcpStream::connect(addr).await.unwrap();
        let mut player = TcpStream::connect(addr).await.unwrap();

        let mut referee_reader = BufReader::new(&mut referee);
        let mut line = String::new();
        referee_reader.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "SINGLE@0@WELCOME 0");

        let mut player_reader = BufReader::new(&mut player);
        let mut line = String::new();
        player_reader.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "SINGLE@1@WELCOME 1");

        player.write_all(b"SINGLE@0@HELLO\n").await.unwrap();
        let mut line = String::new();
        referee_reader.read_line(&mut line).await.unwrap();
        assert_eq!(line.trim(), "SINGLE@1@HELLO");
    }
}
