//! VotaBot binary: wires the store, scheduler, Discord channel, and command
//! dispatcher together and runs until ctrl-c.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use votabot::channels::discord::DiscordChannel;
use votabot::cli::{self, Cli, Command};
use votabot::commands::Dispatcher;
use votabot::scheduler::Scheduler;
use votabot::store::PollStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::Version) => {
            cli::handle_version();
            ExitCode::SUCCESS
        }
        Some(Command::Config(command)) => match cli::handle_config(&cli, command) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("config error: {e}");
                ExitCode::FAILURE
            }
        },
        Some(Command::Start) | None => {
            init_tracing();
            match run(&cli).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "bot exited with error");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = cli.load_config()?;
    let store = Arc::new(PollStore::open(&config.store_path).await?);

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let discord = Arc::new(DiscordChannel::new(config.discord.clone(), event_tx));
    discord.connect().await?;

    let dispatcher = Dispatcher::new(
        store.clone(),
        discord.clone(),
        config.prefix.clone(),
        config.invite_link.clone(),
    );

    let cancel = CancellationToken::new();

    let autosave = tokio::spawn(store.clone().run_autosave(
        Duration::from_secs(config.autosave_secs),
        cancel.clone(),
    ));

    let scheduler = Scheduler::new(store.clone(), discord.clone());
    let sweeps = {
        let cancel = cancel.clone();
        let expiration = Duration::from_secs(config.expiration_sweep_secs);
        let retention = Duration::from_secs(config.retention_sweep_secs);
        tokio::spawn(async move { scheduler.run(expiration, retention, cancel).await })
    };

    info!(prefix = %config.prefix, "VotaBot running");

    loop {
        tokio::select! {
            Some(command) = event_rx.recv() => {
                dispatcher.handle(&command).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    cancel.cancel();
    let _ = sweeps.await;
    let _ = autosave.await; // runs a final save before returning
    Ok(())
}
