mod commands;
mod config;
mod session;

use clap::{Parser, Subcommand};
use config::CliConfig;
use hilo_game::GameError;
use session::Session;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hilo")]
#[command(about = "Sealed-guess HiLo games settled through a decryption oracle")]
#[command(version)]
struct Cli {
    /// Data directory for the game database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Network (regtest, signet, testnet, mainnet)
    #[arg(long, global = true, default_value = "regtest")]
    network: String,

    /// Oracle passphrase (prompted if not provided)
    #[arg(long, global = true)]
    passphrase: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account funding and balances
    #[command(subcommand)]
    Account(commands::AccountCommands),

    /// Game lifecycle commands
    #[command(subcommand)]
    Game(commands::GameCommands),

    /// Local oracle commands
    #[command(subcommand)]
    Oracle(commands::OracleCommands),
}

fn report(e: &anyhow::Error) {
    match e.downcast_ref::<GameError>() {
        Some(GameError::RoundStillActive { ends_at }) => {
            eprintln!("Error: Round is still active");
            eprintln!("Try again after {}", ends_at);
        }
        Some(GameError::RevealAlreadyPending(id)) => {
            eprintln!("Error: Game {} is waiting on the oracle", id);
            eprintln!("Use 'hilo oracle process' to deliver pending results");
        }
        Some(GameError::GuessesNotDisclosed) => {
            eprintln!("Error: Guesses have not been disclosed yet");
            eprintln!("Use 'hilo game disclose' first, then 'hilo oracle process'");
        }
        Some(GameError::GameNotFound(id)) => {
            eprintln!("Error: Game {} not found", id);
            eprintln!("Use 'hilo game list' to see available games");
        }
        Some(GameError::Core(hilo_core::HiloError::InsufficientFunds { need, available })) => {
            eprintln!("Error: Insufficient funds");
            eprintln!("Need: {} sats, Available: {} sats", need, available);
        }
        Some(err) if err.is_retryable() => {
            eprintln!("Error: {} (retry later)", err);
        }
        _ => {
            eprintln!("Error: {:#}", e);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::default();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    config.network = cli.network;
    config.oracle_passphrase = cli.passphrase;
    config.verbose = cli.verbose;

    // Initialize logging
    let log_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "hilo={level},hilo_core={level},hilo_game={level}",
            level = log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::fs::create_dir_all(&config.data_dir).await?;

    let result = match Session::open(&config).await {
        Ok(session) => match cli.command {
            Commands::Account(cmd) => commands::handle_account_command(cmd, &session).await,
            Commands::Game(cmd) => commands::handle_game_command(cmd, &session).await,
            Commands::Oracle(cmd) => commands::handle_oracle_command(cmd, &session).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }

    Ok(())
}
