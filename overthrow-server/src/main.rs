mod orchestrator;
mod referee;
mod relay;

use clap::{Parser, ValueEnum};
use referee::{Mode, Referee};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StartMode {
    Auto,
    Manual,
}

impl From<StartMode> for Mode {
    fn from(mode: StartMode) -> Self {
        match mode {
            StartMode::Auto => Mode::Auto,
            StartMode::Manual => Mode::Manual,
        }
    }
}

/// Runs a relay plus an in-process referee for one game of Coup
/// (`spec.md` §4.4/§4.1), grounded in `run_game.py`'s single entrypoint
/// for standing up a server and its players.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to bind the relay on.
    #[arg(long, default_value = "localhost")]
    address: String,

    /// Port to bind the relay on.
    #[arg(short, long, default_value_t = 12345)]
    port: u16,

    /// Start trigger: wait for six HELLOs, or for an operator keypress
    /// once at least two players have joined.
    #[arg(short, long, value_enum, default_value_t = StartMode::Manual)]
    mode: StartMode,

    /// Raise the default log level.
    #[arg(short, long)]
    verbose: bool,

    /// Spawn this many bot subprocesses against the relay once it is up.
    #[arg(long)]
    spawn_bots: Option<u8>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(console_subscriber::spawn())
        .with(
            tracing_subscriber::fmt::layer().with_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| format!("{}={default_filter}", env!("CARGO_CRATE_NAME")).into()),
            ),
        )
        .init();

    let listener = TcpListener::bind((args.address.as_str(), args.port))
        .await
        .expect("relay address and port are bindable");
    let relay_addr = listener.local_addr().expect("bound listener has a local address");
    tracing::info!(%relay_addr, "relay listening");

    tokio::spawn(async move {
        if let Err(err) = relay::run(listener).await {
            tracing::error!(%err, "relay stopped");
        }
    });

    let bot_handles = match args.spawn_bots {
        Some(count) if count > 0 => orchestrator::spawn_bots(relay_addr, count)
            .expect("bot binaries are spawnable"),
        _ => Vec::new(),
    };

    // Dial in before any bot so the relay hands us address 0.
    let referee = Referee::connect(relay_addr, args.mode.into())
        .await
        .expect("relay welcomes the first connection as the referee");
    if let Err(err) = referee.run().await {
        tracing::error!(%err, "game ended in error");
    }

    orchestrator::wait_all(bot_handles).await;
}
