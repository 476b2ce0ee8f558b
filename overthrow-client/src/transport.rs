//! Connects to the relay, claims the address it hands out in its enveloped
//! `WELCOME` line, and speaks the envelope grammar underneath the game
//! messages: every outgoing line is wrapped `SINGLE@0@<payload>`
//! (addressed to the referee, always address 0) and every incoming line
//! arrives `SINGLE@<from>@<payload>` regardless of how the referee
//! addressed it, since the relay's router re-wraps broadcasts per
//! recipient. Grounded in the teacher's `src/server.rs`
//! `client_message_handler` task (a socket relayed through local
//! channels) adapted from WebSocket+JSON framing to raw TCP with
//! [`split_lines`] and this protocol's envelope layer.

use overthrow_types::wire::{Addr, Envelope, GameMessage, WireError, split_lines};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

const READ_CHUNK: usize = 4096;
const WELCOME_PREFIX: &str = "WELCOME ";
const REFEREE_ADDR: Addr = 0;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("relay closed the connection before sending WELCOME")]
    NoWelcome,
    #[error("malformed WELCOME line: {0:?}")]
    MalformedWelcome(String),
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    #[error("relay sent a non-Single envelope to a player")]
    UnexpectedEnvelope,
    #[error("relay closed the connection")]
    Closed,
}

/// A live session with the relay: this participant's assigned address,
/// plus split read/write halves for the game-message stream.
pub struct Transport {
    pub addr: Addr,
    reader: OwnedReadHalf,
    writer: BufWriter<OwnedWriteHalf>,
    buf: String,
    pending: std::collections::VecDeque<String>,
}

impl Transport {
    pub async fn connect(address: &str, port: u16) -> Result<Transport, TransportError> {
        let stream = TcpStream::connect((address, port)).await?;
        let (mut reader, writer) = stream.into_split();
        let mut buf = String::new();
        let mut pending = std::collections::VecDeque::new();

        let addr = loop {
            if let Some(line) = pending.pop_front() {
                let envelope = Envelope::parse(&line)
                    .map_err(|_| TransportError::MalformedWelcome(line.clone()))?;
                let Envelope::Single { payload, .. } = envelope else {
                    return Err(TransportError::MalformedWelcome(line));
                };
                let Some(rest) = payload.strip_prefix(WELCOME_PREFIX) else {
                    return Err(TransportError::MalformedWelcome(payload));
                };
                break rest
                    .trim()
                    .parse::<Addr>()
                    .map_err(|_| TransportError::MalformedWelcome(payload))?;
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(TransportError::NoWelcome);
            }
            buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
            pending.extend(split_lines(&mut buf));
        };

        Ok(Transport {
            addr,
            reader,
            writer: BufWriter::new(writer),
            buf,
            pending,
        })
    }

    /// Blocks until the next complete line arrives, unwraps its envelope,
    /// and parses the payload as a [`GameMessage`].
    pub async fn recv(&mut self) -> Result<GameMessage, TransportError> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                let envelope = Envelope::parse(&line)?;
                let Envelope::Single { payload, .. } = envelope else {
                    return Err(TransportError::UnexpectedEnvelope);
                };
                return Ok(GameMessage::parse(&payload)?);
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            self.buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
            self.pending.extend(split_lines(&mut self.buf));
        }
    }

    /// Wraps `msg` as an envelope addressed to the referee and sends it.
    pub async fn send(&mut self, msg: &GameMessage) -> Result<(), TransportError> {
        let line = Envelope::Single {
            addr: REFEREE_ADDR,
            payload: msg.serialize(),
        }
        .serialize();
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
