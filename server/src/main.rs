use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::engine::{EngineConfig, GameEngine};
use server::network::{Server, ServerMessage};
use server::store::InMemorySessionStore;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "256")]
    max_clients: usize,

    /// Seconds of silence before a client is forgotten
    #[arg(short = 't', long, default_value = "300")]
    client_timeout: u64,

    /// Attempts per operation when concurrent requests collide
    #[arg(short = 'r', long, default_value = "16")]
    max_commit_retries: usize,

    /// Seed the random source for reproducible games
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let rng = match args.seed {
        Some(seed) => {
            info!("Using fixed random seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };
    let config = EngineConfig {
        max_commit_retries: args.max_commit_retries.max(1),
    };
    let engine = Arc::new(GameEngine::with_rng(
        Arc::new(InMemorySessionStore::new()),
        rng,
        config,
    ));

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        engine,
        args.max_clients,
        Duration::from_secs(args.client_timeout),
    )
    .await?;

    let control = server.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            let _ = control.send(ServerMessage::Shutdown);
        }
    });

    server.run().await
}
