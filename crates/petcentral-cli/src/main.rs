//! PetCentral admin - a terminal front end for the PetCentral admin API.
//!
//! Every command goes through the same session layer the console uses:
//! the stored credential is attached to each call, and a rejected
//! credential sends the user back to `petcentral login`, after which the
//! interrupted screen is shown again.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{Command, Console};
use petcentral_core::Config;

// ============================================================================
// Constants
// ============================================================================

/// Log file name prefix inside the logs directory
const LOG_FILE_PREFIX: &str = "petcentral.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`). With a log
/// directory, a daily rolling file is written as well; keep the returned
/// guard alive so buffered lines are flushed on exit.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Remove a bare flag from the argument list, reporting whether it was there
fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    let before = args.len();
    args.retain(|a| a != flag);
    args.len() != before
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let log_to_file = take_flag(&mut args, "--log-file");

    let mut config = Config::load()?;
    let log_dir = if log_to_file {
        Some(config.cache_dir()?.join("logs"))
    } else {
        None
    };
    let _log_guard = init_tracing(log_dir);
    config.apply_env_overrides();

    let command = Command::parse(&args)?;
    if command == Command::Help {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    info!(api = %config.api_base_url, "PetCentral admin starting");
    let console = Console::open(config)?;
    console.run(command).await
}
