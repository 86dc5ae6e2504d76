//! Command-line and environment configuration.
//!
//! Every option can be given as a flag or through its `LEDGER_*`
//! environment variable.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::logging::LogFormat;
use crate::stores::{MemoryStore, SledStore, StoreResult};
use crate::{Ledger, StatusPolicy};

/// Records deposits and withdrawals and tracks their status.
#[derive(Parser, Debug)]
#[command(name = "transaction-ledger", version, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub logging: LoggingArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Create transactions from a CSV file with `amount,transaction_type,user` rows.
    Import(ImportArgs),
    /// Write a user's transactions to stdout as CSV.
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct LoggingArgs {
    #[arg(long, global = true, env = "LEDGER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Default filter when `RUST_LOG` is unset.
    #[arg(
        long,
        global = true,
        env = "LEDGER_LOG_LEVEL",
        default_value = "transaction_ledger=info,tower_http=info"
    )]
    pub log_level: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum StorageKind {
    /// Lost on exit.
    Memory,
    /// Embedded database under `--data-dir`.
    #[default]
    Sled,
}

#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    #[arg(long, env = "LEDGER_STORAGE", value_enum, default_value_t = StorageKind::Sled)]
    pub storage: StorageKind,

    #[arg(long, short = 'd', env = "LEDGER_DATA_DIR", default_value = "ledger-data")]
    pub data_dir: PathBuf,

    /// Whether completed and failed transactions may be overwritten.
    #[arg(long, env = "LEDGER_STATUS_POLICY", value_enum, default_value_t = StatusPolicy::Terminal)]
    pub status_policy: StatusPolicy,
}

impl StorageArgs {
    /// Opens the configured backend and wraps it in a [`Ledger`].
    pub fn open_ledger(&self) -> StoreResult<Ledger> {
        let ledger = match self.storage {
            StorageKind::Memory => Ledger::new(Arc::new(MemoryStore::new())),
            StorageKind::Sled => Ledger::new(Arc::new(SledStore::open(&self.data_dir)?)),
        };
        Ok(ledger.with_policy(self.status_policy))
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub storage: StorageArgs,

    #[arg(long, env = "LEDGER_LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(flatten)]
    pub storage: StorageArgs,

    pub input: PathBuf,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub storage: StorageArgs,

    #[arg(long)]
    pub user_id: u64,
}
