use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;

use cli::Cli;
use config::Settings;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings);

    let db_path = settings.resolve_db_path(cli.db)?;

    // Commands run one at a time; a current-thread runtime is all sqlx needs.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async {
        let store = tally_storage::SqliteStore::open(&db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        let mut stdout = std::io::stdout().lock();
        let result = commands::run(&store, cli.command, &mut stdout).await;
        store.close().await;
        result
    })
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.log_filter()))
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
