// Framework bootstrap for the catalog command line client.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::StorageError;
use crate::frameworks::config;
use crate::interface_adapters::cli::{self, CliError, Command};
use crate::interface_adapters::http::ClientBuildError;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::storage::FileStorage;
use crate::use_cases::Subscription;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to open storage: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Client(#[from] ClientBuildError),
}

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // stdout carries command output.
    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run() -> ExitCode {
    init_runtime();

    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(error) => {
            eprintln!("{}", CliError::from(error));
            return ExitCode::from(2);
        }
    };

    let (state, _watcher) = match build_state() {
        Ok(built) => built,
        Err(error) => {
            tracing::error!(%error, "failed to start");
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let mut out = io::stdout();
    match dispatch(&state, command, config::page_size(), &mut out).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = out.flush();
            eprintln!("{error}");
            match error {
                CliError::Usage(_) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

// Mounts the session listeners for the lifetime of one command.
pub async fn dispatch<W: Write>(
    state: &AppState,
    command: Command,
    page_size: usize,
    out: &mut W,
) -> Result<(), CliError> {
    let _storage_events = state.session.mount();
    let _unauthorized_events = state
        .session
        .follow_unauthorized(state.api.unauthorized().subscribe());

    cli::execute(state, command, page_size, out).await
}

fn build_state() -> Result<(AppState, Subscription), BootstrapError> {
    let storage = FileStorage::open(config::storage_path())?;
    let watcher = storage.spawn_watcher(config::storage_poll_interval());
    tracing::debug!(path = %storage.path().display(), "storage opened");

    let state = AppState::build(&config::api_url(), Arc::new(storage))?;
    Ok((state, watcher))
}
