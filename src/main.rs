//! Cookie Relay - per-user cookie snapshot storage for a browser extension.
//!
//! The extension saves, restores and bulk-syncs cookies per domain through
//! the HTTP API started by `serve`. Records live in `SQLite` (or memory),
//! accounts in an Identity Toolkit project.
//!
//! QUICK START:
//!   cookie-relay init-config                     # Write ~/.cookie-relay/config.toml
//!   cookie-relay serve                           # Run the API on 0.0.0.0:3000
//!   cookie-relay stats --user <uid>              # Inspect a user's records
//!   cookie-relay sync --user <uid> --snapshot f  # Push a local storage dump
//!   cookie-relay sweep                           # Repair the domain index

mod api;
mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use api::{create_router, AppContext};
use application::{
    format_domains, format_json, format_repairs, format_stats, format_sync_report, CookieStore,
    OutputFormat,
};
use cli::{Cli, Commands};
use domain::{AppError, StorageBackend};
use infrastructure::{config_file_path, ensure_config_exists, load_config};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Servers log at info unless asked otherwise
    let verbosity = if cli.is_server() {
        cli.verbose.max(1)
    } else {
        cli.verbose
    };
    setup_logging(verbosity, cli.is_server());

    let outcome = match &cli.command {
        Commands::Serve { bind, in_memory } => {
            serve(cli.config.as_deref(), bind.clone(), *in_memory).await
        }
        _ => run(&cli).await.map_err(anyhow::Error::from),
    };

    if let Err(e) = outcome {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

/// Maintenance commands.
async fn run(cli: &Cli) -> domain::Result<()> {
    let format = cli
        .output_format()
        .map_err(|e| AppError::Config { message: e })?;

    if matches!(cli.command, Commands::InitConfig) {
        return cmd_init_config(cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    let ctx = AppContext::from_config(config)?;

    match &cli.command {
        Commands::Sync { user, snapshot } => cmd_sync(&ctx, user, snapshot, format).await,
        Commands::Domains { user } => {
            let domains = ctx.store.list_domains(user).await?;
            print_report(&domains, format, || format_domains(&domains))
        }
        Commands::Stats { user } => {
            let stats = ctx.store.stats_for(user).await?;
            print_report(&stats, format, || format_stats(&stats))
        }
        Commands::Sweep { user } => {
            let repairs = match user {
                Some(user) => vec![ctx.store.repair_index(user).await?],
                None => ctx.store.repair_all().await?,
            };
            print_report(&repairs, format, || format_repairs(&repairs))
        }
        Commands::Serve { .. } | Commands::InitConfig => Ok(()),
    }
}

/// Push a snapshot file through the reconciler.
async fn cmd_sync(
    ctx: &AppContext,
    user: &str,
    snapshot: &Path,
    format: OutputFormat,
) -> domain::Result<()> {
    let content = std::fs::read_to_string(snapshot).map_err(|e| {
        AppError::io(format!("Failed to read snapshot: {}", snapshot.display()), e)
    })?;

    let Value::Object(snapshot) = serde_json::from_str::<Value>(&content).map_err(AppError::json_parse)?
    else {
        return Err(AppError::validation(
            "Snapshot must be a JSON object keyed by domain",
        ));
    };

    let report = ctx.reconciler.sync(user, &snapshot).await;
    print_report(&report, format, || format_sync_report(&report))
}

fn cmd_init_config(path: Option<&Path>) -> domain::Result<()> {
    let path = path.map_or_else(config_file_path, Path::to_path_buf);

    if ensure_config_exists(&path)? {
        println!("{} {}", "✓ Created".green(), path.display());
    } else {
        println!("{} {}", "Config already exists:".dimmed(), path.display());
    }
    Ok(())
}

fn print_report<T, F>(value: &T, format: OutputFormat, table: F) -> domain::Result<()>
where
    T: serde::Serialize + ?Sized,
    F: FnOnce() -> String,
{
    let out = match format {
        OutputFormat::Json => format_json(value).map_err(AppError::json_parse)?,
        OutputFormat::Table => table(),
    };
    println!("{out}");
    Ok(())
}

/// Run the HTTP API until SIGINT/SIGTERM.
async fn serve(config_path: Option<&Path>, bind: Option<String>, in_memory: bool) -> anyhow::Result<()> {
    let mut config = load_config(config_path).context("Failed to load configuration")?;
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }
    if in_memory {
        config.storage.backend = StorageBackend::Memory;
    }

    if config.identity.api_key.is_empty() {
        warn!("No identity API key configured; sign-in and token checks will fail");
    }
    info!(
        environment = %config.server.environment,
        backend = ?config.storage.backend,
        origins = ?config.server.allowed_origins,
        "Configuration loaded"
    );

    let bind_address = config.server.bind_address.clone();
    let sweep_every = config.sync.index_sweep_interval_secs;
    let ctx = Arc::new(AppContext::from_config(config).context("Failed to initialize services")?);

    let cancel = CancellationToken::new();
    if sweep_every > 0 {
        tokio::spawn(run_index_sweep(
            ctx.store.clone(),
            Duration::from_secs(sweep_every),
            cancel.clone(),
        ));
    }

    let app = create_router(ctx);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;

    info!(address = %bind_address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    cancel.cancel();
    info!("Server shut down gracefully");
    Ok(())
}

/// Periodically repair every user's domain index.
async fn run_index_sweep(store: CookieStore, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick fires immediately; wait a full period instead.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => match store.repair_all().await {
                Ok(repairs) => {
                    let repaired = repairs.iter().filter(|r| !r.is_clean()).count();
                    info!(users = repairs.len(), repaired, "Index sweep completed");
                }
                Err(e) => warn!(error = %e, "Index sweep failed"),
            },
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down..."),
        () = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

/// Setup logging with the specified verbosity level.
fn setup_logging(verbosity: u8, timestamps: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let registry = tracing_subscriber::registry().with(filter);

    if timestamps {
        registry.with(fmt::layer().with_target(false)).init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
