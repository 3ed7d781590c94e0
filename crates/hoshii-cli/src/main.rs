mod logging;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use hoshii_core::config::AppConfig;
use hoshii_core::models::AnimeId;
use hoshii_runtime::{RefreshState, Runtime, RuntimeError};

use render::TerminalView;

#[derive(Debug, Parser)]
#[command(name = "hoshii", version, about = "Keep a local anime watchlist backed by AniList")]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage database to use instead of the platform default.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print saved AniList IDs in the order they were added.
    List,
    /// Add an anime if it is missing, remove it otherwise.
    Toggle { id: u64 },
    /// Add an anime to the watchlist.
    Add { id: u64 },
    /// Remove an anime from the watchlist.
    Remove { id: u64 },
    /// Exit successfully if the anime is saved.
    Contains { id: u64 },
    /// Fetch and display the watchlist from AniList.
    Show,
    /// Print where config and storage live.
    ConfigPath,
    /// Write the active settings to the config file.
    InitConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let config = match AppConfig::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("hoshii: {e}");
            return ExitCode::from(2);
        }
    };
    let _log_guard = logging::init(&config.logging, &AppConfig::log_dir());

    match run(cli, config, config_path).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "hoshii failed");
            eprintln!("hoshii: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli, config: AppConfig, config_path: PathBuf) -> Result<ExitCode, RuntimeError> {
    let db_path = match cli.db {
        Some(path) => path,
        None => AppConfig::ensure_db_path().map_err(|e| RuntimeError::Config(e.to_string()))?,
    };

    if let Command::ConfigPath = cli.command {
        println!("config:  {}", config_path.display());
        println!("storage: {}", db_path.display());
        println!("logs:    {}", AppConfig::log_dir().display());
        return Ok(ExitCode::SUCCESS);
    }
    if let Command::InitConfig = cli.command {
        config
            .save_to(&config_path)
            .map_err(|e| RuntimeError::Config(e.to_string()))?;
        println!("wrote {}", config_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let runtime = Runtime::new(config, &db_path)?;

    match cli.command {
        Command::List => {
            for id in runtime.list().await {
                println!("{id}");
            }
        }
        Command::Toggle { id } => {
            let present = runtime.toggle(AnimeId(id)).await;
            println!("{id} {}", membership(present));
        }
        Command::Add { id } => {
            runtime.add(AnimeId(id)).await;
            println!("{id} {}", membership(true));
        }
        Command::Remove { id } => {
            runtime.remove(AnimeId(id)).await;
            println!("{id} {}", membership(false));
        }
        Command::Contains { id } => {
            let present = runtime.contains(AnimeId(id)).await;
            println!("{id} {}", membership(present));
            if !present {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Show => {
            let _view_guard = runtime.view_guard();
            let mut view = TerminalView::new(std::io::stdout().lock());
            let shown = runtime.show_watchlist(&mut view).await;
            if !show_succeeded(shown, runtime.sync().state()) {
                return Ok(ExitCode::FAILURE);
            }
        }
        // Handled before storage was opened.
        Command::ConfigPath | Command::InitConfig => {}
    }

    Ok(ExitCode::SUCCESS)
}

/// `show` fails when nothing was rendered or the catalog query failed.
fn show_succeeded(shown: bool, state: RefreshState) -> bool {
    shown && state != RefreshState::Failed
}

fn membership(present: bool) -> &'static str {
    if present {
        "is on your watchlist"
    } else {
        "is not on your watchlist"
    }
}
