//! A non-interactive participant: connects, registers, and answers
//! every prompt via a [`BotKind`] policy. Event-loop shape (connect,
//! loop on one incoming line at a time, decide, reply) is grounded in
//! the teacher's `src/main.rs` `tokio::select!` over transport/local
//! events, collapsed to a straight read-decide-write cycle since a bot
//! has no terminal input to multiplex against.

use std::collections::HashSet;

use clap::Parser;
use overthrow_client::participant::Participant;
use overthrow_client::policy::BotKind;
use overthrow_client::transport::Transport;
use overthrow_types::wire::GameMessage;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Runs one bot participant against a running relay (`spec.md` §6).
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Relay address to connect to.
    #[arg(long, default_value = "localhost")]
    address: String,

    /// Relay port to connect to.
    #[arg(short, long, default_value_t = 12345)]
    port: u16,

    /// An operator-facing label for this bot; carries no protocol meaning.
    #[arg(long)]
    id: u32,

    /// Decision policy.
    #[arg(long, value_enum, default_value_t = BotKind::Random)]
    kind: BotKind,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::registry()
        .with(console_subscriber::spawn())
        .with(
            tracing_subscriber::fmt::layer().with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
            ),
        )
        .init();

    let mut transport = Transport::connect(&args.address, args.port)
        .await
        .expect("relay reachable");
    let mut participant = Participant::new(transport.addr);
    tracing::info!(bot = args.id, addr = transport.addr, kind = ?args.kind, "connected");

    transport
        .send(&GameMessage::Hello)
        .await
        .expect("relay accepts HELLO from a freshly welcomed connection");

    let mut banned: HashSet<String> = HashSet::new();
    let mut last_sent: Option<String> = None;

    loop {
        let msg = match transport.recv().await {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(bot = args.id, %err, "transport closed");
                break;
            }
        };

        match msg {
            GameMessage::Illegal => {
                if let Some(rejected) = last_sent.take() {
                    banned.insert(rejected);
                }
            }
            GameMessage::Exit => {
                participant.on_message(&msg);
                tracing::info!(bot = args.id, "game over");
                break;
            }
            other => {
                participant.on_message(&other);
                banned.clear();
            }
        }

        let legal = participant.legal_replies();
        if legal.is_empty() {
            continue;
        }
        let candidates: Vec<String> = legal.iter().filter(|m| !banned.contains(*m)).cloned().collect();
        let candidates = if candidates.is_empty() { legal } else { candidates };

        let reply = args.kind.choose(&participant, &candidates);
        let reply_msg = GameMessage::parse(&reply).expect("policies only return legal wire strings");
        participant.apply_own_reply(&reply_msg);

        if transport.send(&reply_msg).await.is_err() {
            break;
        }
        last_sent = Some(reply);
    }
}
