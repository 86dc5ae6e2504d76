pub mod api;
pub mod config;
mod csv_utils;
pub mod dto;
mod error;
mod ledger;
pub mod logging;
mod runner;
pub mod stores;

pub use dto::{
    CreateTransaction, ListTransactionsQuery, Transaction, TransactionStatus, TransactionType,
    UpdateStatusRequest,
};
pub use error::Error;
pub use ledger::{Ledger, StatusPolicy};
pub use runner::{export, import, ImportError, ImportFailure, ImportSummary};
