//! liveshop - terminal client for the liveshop API.
//!
//! Signs in, restores the persisted session, and makes authenticated calls
//! through the same session layer the app uses.

mod commands;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Command;
use liveshop_core::config::CredentialBackend;
use liveshop_core::{AuthStore, Config, SessionClient};

/// Log file prefix inside the cache directory
const LOG_FILE_PREFIX: &str = "liveshop.log";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr and, when a cache directory is available, to a daily
/// rolling file. The returned guard must be held until exit.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.cache_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, ephemeral) = match commands::parse(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}\n\n{}", e, commands::USAGE);
            std::process::exit(2);
        }
    };

    let mut config = Config::load()?.with_env();
    if ephemeral {
        config.credential_backend = CredentialBackend::Memory;
    }

    let _log_guard = init_tracing(&config);
    info!(base_url = config.api_base_url(), "liveshop starting");

    if matches!(command, Command::Help) {
        println!("{}", commands::USAGE);
        return Ok(());
    }

    let credentials = config
        .credential_store()
        .context("Failed to open credential store")?;
    let api = SessionClient::from_config(&config, credentials)?;
    let store = Arc::new(AuthStore::new(api));
    let _listener = store.spawn_session_listener();

    let result = commands::run(&store, &mut config, command).await;

    info!("liveshop exiting");
    result
}
