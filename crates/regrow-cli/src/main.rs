//! regrow-play - grow a tree from the terminal
//!
//! Reads one command per line from stdin. Progress is saved to the server
//! named by `REGROW_API_BASE`, or kept in memory when it is unset.
//!
//! Usage:
//!   regrow-play
//!   echo "login kim\nfertilize\nquit" | regrow-play

mod command;

use command::{print_usage, PlayCommand};
use regrow_progress::{Action, ProgressEvent, PROGRESS_CAP};
use regrow_sync::{
    ActionError, FileCache, GameHandle, GameSession, HttpProgressStore, Identity,
    MemoryProgressStore, RemoteProgressStore, Snapshot, SyncConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const BAR_WIDTH: usize = 20;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they do not interleave with the game output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "regrow_play=info,regrow_sync=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let store: Arc<dyn RemoteProgressStore> = match std::env::var("REGROW_API_BASE") {
        Ok(base) => {
            tracing::info!("Saving progress to {}", base);
            Arc::new(HttpProgressStore::new(base)?)
        }
        Err(_) => {
            tracing::info!("REGROW_API_BASE not set, progress is kept in memory");
            Arc::new(MemoryProgressStore::new())
        }
    };
    let cache_path = std::env::var("REGROW_CACHE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./regrow-cache.json"));

    let cache = Arc::new(FileCache::new(cache_path));
    let game = GameSession::spawn(store, cache, SyncConfig::from_env());
    let mut events = game.events();

    // No one is signed in until `login`
    game.set_identity(Identity::Anonymous).await?;
    println!("{}", format_status(&game.snapshot()));
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match PlayCommand::parse(&line) {
            None => continue,
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };

        if command == PlayCommand::Quit {
            break;
        }
        run_command(&game, command).await?;
        print_notices(&mut events);
    }

    println!("Saving...");
    game.shutdown().await?;
    Ok(())
}

async fn run_command(game: &GameHandle, command: PlayCommand) -> Result<(), ActionError> {
    match command {
        PlayCommand::Login(user) => {
            game.set_identity(Identity::user(user)).await?;
            if game.is_loading() {
                println!("{}", format_status(&game.snapshot()));
            }
            let snapshot = game.loaded().await?;
            println!("{}", format_status(&snapshot));
        }
        PlayCommand::Logout => {
            game.set_identity(Identity::Anonymous).await?;
            println!("{}", format_status(&game.snapshot()));
        }
        PlayCommand::Water => act(game, Action::Water).await?,
        PlayCommand::Fertilize => act(game, Action::Fertilize).await?,
        PlayCommand::Reset => {
            game.reset().await?;
            println!("{}", format_status(&game.snapshot()));
        }
        PlayCommand::Status => println!("{}", format_status(&game.snapshot())),
        PlayCommand::Dismiss => game.dismiss_completion().await?,
        PlayCommand::Help => print_usage(),
        PlayCommand::Quit => {}
    }
    Ok(())
}

async fn act(game: &GameHandle, action: Action) -> Result<(), ActionError> {
    match game.apply(action).await {
        Ok(_) => println!("{}", format_status(&game.snapshot())),
        Err(ActionError::LoginRequired) => {
            println!("Log in to grow your tree (login <user>).");
        }
        Err(e) if e.is_insufficient_funds() => println!("{}", e),
        Err(e) => return Err(e),
    }
    Ok(())
}

fn print_notices(events: &mut broadcast::Receiver<ProgressEvent>) {
    loop {
        match events.try_recv() {
            Ok(ProgressEvent::LevelUp { level, reward }) => {
                println!("Level {} reached! (reward: {} coins)", level, reward);
            }
            Ok(ProgressEvent::CycleCompleted(notice)) => {
                println!(
                    "Congratulations! Tree #{} fully grown. Reward: {} coins. ('dismiss' to close)",
                    notice.trees_grown, notice.reward
                );
            }
            Ok(ProgressEvent::StateChanged(_)) => {}
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                tracing::debug!(missed, "Skipped progress events");
            }
            Err(_) => break,
        }
    }
}

fn format_status(snapshot: &Snapshot) -> String {
    let state = &snapshot.state;
    let filled = ((state.progress_pct / PROGRESS_CAP) * BAR_WIDTH as f64) as usize;
    let filled = filled.min(BAR_WIDTH);

    let mut line = format!(
        "[{}] Level {} [{}{}] {:.0}% | {} coins | {} trees grown",
        snapshot.identity,
        state.level,
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        state.progress_pct,
        state.currency,
        state.trees_grown,
    );
    if snapshot.is_loading() {
        line.push_str(" (loading...)");
    }
    if snapshot.completion.is_some() {
        line.push_str(" *tree complete*");
    }
    line
}
