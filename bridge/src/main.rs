mod cli;
mod lichess;
mod serial;

use tracing_subscriber::prelude::*;

use std::{fs::OpenOptions, path::Path, sync::Mutex, time::Duration};

use anyhow::Context;
use clap::Parser;
use common::{
    error::RemoteError,
    session::{Bridge, BridgeEvent},
};
use futures::FutureExt;
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    cli::Cli,
    lichess::{GameEvent, Lichess, PlayingGame},
    serial::SerialSink,
};

fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            let path = dir.join(format!("{}.log", chrono::Local::now().format("%Y-%m-%d")));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()?;
    Ok(())
}

async fn find_game(lichess: &Lichess, poll_interval: Duration) -> anyhow::Result<PlayingGame> {
    loop {
        info!("looking for a game...");
        match lichess.current_game().await {
            Ok(Some(game)) => return Ok(game),
            Ok(None) => info!("no game found, retrying in {}s", poll_interval.as_secs()),
            // a bad token won't fix itself
            Err(e @ RemoteError::Rejected { .. }) => {
                return Err(e).context("lichess refused to list games");
            }
            Err(e) => warn!("could not fetch current games: {e}"),
        }
        sleep(poll_interval).await;
    }
}

async fn follow_game(lichess: &Lichess, bridge: &Bridge, game_id: &str) -> Result<(), RemoteError> {
    let mut stream = lichess.stream_game(game_id).await?;
    info!(%game_id, "lichess stream opened");

    while let Some(event) = stream.next_event().await? {
        match event {
            GameEvent::GameFull { state } | GameEvent::GameState(state) => {
                debug!(
                    wtime = state.wtime,
                    btime = state.btime,
                    status = %state.status,
                    "clocks"
                );
                if let Some(winner) = state.winner {
                    info!(%winner, status = %state.status, "game over");
                }
                bridge.on_remote_moves(state.moves);
            }
            GameEvent::OpponentGone {
                gone: true,
                claim_win_in_seconds: Some(seconds),
            } if seconds <= 0 => {
                if let Err(e) = bridge.on_opponent_gone_claimable().await {
                    warn!("could not claim victory: {e}");
                }
            }
            GameEvent::OpponentGone {
                gone,
                claim_win_in_seconds,
            } => info!(gone, ?claim_win_in_seconds, "opponent gone, waiting for claim win"),
            GameEvent::ChatLine { username, text, .. } => info!(%username, %text, "chat"),
            GameEvent::Other => debug!("ignoring lichess event"),
        }
    }
    Ok(())
}

async fn play_games(
    lichess: Lichess,
    bridge: Bridge,
    poll_interval: Duration,
) -> anyhow::Result<()> {
    loop {
        let game = find_game(&lichess, poll_interval).await?;
        info!(game_id = %game.full_id, color = %game.color, "found game");
        bridge.reset_session(game.full_id.as_str(), game.color);

        if let Err(e) = follow_game(&lichess, &bridge, &game.full_id).await {
            error!("error in lichess stream: {e}");
        }
        info!("game ended");
        bridge.terminate_session();
    }
}

async fn watch_events(mut events: mpsc::UnboundedReceiver<BridgeEvent>) -> anyhow::Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            BridgeEvent::MoveCommitted { game_id, mv } => info!(%game_id, %mv, "move played"),
            // already logged by the bridge; the player has to put the board right
            BridgeEvent::CommitFailed { .. } => {}
            BridgeEvent::IndicatorFailed(e) => {
                return Err(e).context("could not write LED command to the board");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_dir.as_deref())?;

    let port = serial::open(cli.port.as_deref(), cli.baud_rate)?;
    let (reader, writer) = tokio::io::split(port);
    let lichess = Lichess::new(&cli.api_base, &cli.token)?;
    let (bridge, events) = Bridge::new(
        cli.bridge_config(),
        lichess.clone(),
        SerialSink::new(writer),
    );

    let board = serial::read_frames(reader, bridge.clone());
    let games = play_games(lichess, bridge, cli.poll_interval());
    futures::select! {
        result = board.fuse() => result,
        result = games.fuse() => result,
        result = watch_events(events).fuse() => result,
    }
}
