use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;

use transaction_ledger::config::{Cli, Command, ExportArgs, ImportArgs, ServeArgs};
use transaction_ledger::logging::init_logging;
use transaction_ledger::{api, export, import, ListTransactionsQuery};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.logging.log_level, cli.logging.log_format);

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Import(args) => run_import(args).await,
        Command::Export(args) => run_export(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let ledger = args
        .storage
        .open_ledger()
        .with_context(|| format!("failed to open store at {}", args.storage.data_dir.display()))?;
    tracing::info!(
        storage = ?args.storage.storage,
        policy = ?ledger.policy(),
        "ledger opened"
    );

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    tracing::info!("server listening on {}", args.listen);

    axum::serve(listener, api::create_router(ledger))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn run_import(args: ImportArgs) -> Result<()> {
    let ledger = args.storage.open_ledger().context("failed to open store")?;
    match import(&ledger, &args.input).await {
        Ok(summary) => {
            println!("created: {}, rejected: {}", summary.created, summary.rejected);
            Ok(())
        }
        Err(e) => {
            println!(
                "created: {}, rejected: {}",
                e.summary.created, e.summary.rejected
            );
            Err(e).with_context(|| format!("failed to import {}", args.input.display()))
        }
    }
}

async fn run_export(args: ExportArgs) -> Result<()> {
    let ledger = args.storage.open_ledger().context("failed to open store")?;
    let transactions = ledger
        .list_by_user(ListTransactionsQuery {
            user_id: Some(args.user_id),
        })
        .await?;
    export(&transactions, std::io::stdout()).context("failed to write CSV")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutdown signal received, draining connections");
}
