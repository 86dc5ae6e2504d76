//! Domain-specific errors for the transaction ledger.
//!
//! Contains error variants for the failure cases of the ledger operations:
//! - Validation errors (missing fields, malformed ids, disallowed statuses)
//! - Lookup errors (transaction not found)
//! - Lifecycle errors (transition away from a terminal status)
//! - Persistence errors surfaced from the store

use crate::dto::{TransactionId, TransactionStatus};
use crate::stores::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("Transaction not found.")]
    NotFound,

    #[error("transaction {id} is already {current} and cannot become {requested}")]
    InvalidTransition {
        id: TransactionId,
        current: TransactionStatus,
        requested: TransactionStatus,
    },

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}
