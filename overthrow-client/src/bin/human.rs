//! An interactive participant driven from a terminal. Stdin is read on
//! a dedicated blocking thread and fed to the async event loop over a
//! channel, grounded in `examples/original_source/src/terminal/
//! terminal.py`'s `Terminal`/`KeepAlive` pair and `client/human.py`'s
//! `Human.choose_message` (`input("> ")`, validated against
//! `possible_messages`). The surrounding `tokio::select!` over
//! transport-in and stdin-in mirrors the teacher's `src/main.rs` event
//! loop, with a raw line prompt in place of the ratatui screen.

use clap::Parser;
use overthrow_client::participant::Participant;
use overthrow_client::transport::Transport;
use overthrow_types::wire::GameMessage;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Runs one human-driven participant against a running relay (`spec.md` §6).
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Relay address to connect to.
    #[arg(long, default_value = "localhost")]
    address: String,

    /// Relay port to connect to.
    #[arg(short, long, default_value_t = 12345)]
    port: u16,

    /// An operator-facing label; carries no protocol meaning.
    #[arg(long)]
    id: u32,
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut line = String::new();
        loop {
            line.clear();
            match std::io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.trim().to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

fn print_prompt(legal: &[String]) {
    println!("--- your move ---");
    for (i, reply) in legal.iter().enumerate() {
        println!("  [{i}] {reply}");
    }
    print!("> ");
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

/// Matches a typed line against the legal set either by exact text or
/// by the index printed alongside it.
fn resolve_choice<'a>(input: &str, legal: &'a [String]) -> Option<&'a str> {
    if let Ok(index) = input.parse::<usize>() {
        return legal.get(index).map(String::as_str);
    }
    legal.iter().find(|m| m.eq_ignore_ascii_case(input)).map(String::as_str)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer().with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
            ),
        )
        .init();

    let mut transport = Transport::connect(&args.address, args.port)
        .await
        .expect("relay reachable");
    let mut participant = Participant::new(transport.addr);
    println!("connected as player {}", transport.addr);

    transport
        .send(&GameMessage::Hello)
        .await
        .expect("relay accepts HELLO from a freshly welcomed connection");

    let mut stdin_rx = spawn_stdin_reader();
    let mut prompted = false;

    loop {
        let legal = participant.legal_replies();
        if !legal.is_empty() && !prompted {
            print_prompt(&legal);
            prompted = true;
        }

        tokio::select! {
            incoming = transport.recv() => {
                let msg = match incoming {
                    Ok(msg) => msg,
                    Err(err) => {
                        println!("disconnected: {err}");
                        break;
                    }
                };
                if matches!(msg, GameMessage::Illegal) {
                    println!("referee rejected that reply; try again");
                } else {
                    participant.on_message(&msg);
                    println!("{}", describe(&msg));
                    if matches!(msg, GameMessage::Exit) {
                        break;
                    }
                }
                prompted = false;
            }
            line = stdin_rx.recv() => {
                let Some(line) = line else { break };
                let legal = participant.legal_replies();
                match resolve_choice(&line, &legal) {
                    Some(reply) => {
                        let reply_msg = GameMessage::parse(reply).expect("resolved from the legal set");
                        participant.apply_own_reply(&reply_msg);
                        if transport.send(&reply_msg).await.is_err() {
                            break;
                        }
                    }
                    None => println!("not a legal reply right now, try again"),
                }
            }
        }
    }
}

fn describe(msg: &GameMessage) -> String {
    format!("<- {}", msg.serialize())
}
