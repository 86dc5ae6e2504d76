//! Storage layer for the transaction ledger. Provides:
//! - The persistence contract ([`TransactionStore`]) and the atomic id
//!   source ([`SequenceGenerator`])
//! - An in-memory backend ([`MemoryStore`])
//! - A durable embedded backend on sled ([`SledStore`])
//!
//! Both backends implement both traits, so one handle serves a
//! [`crate::Ledger`] as store and sequence.

mod memory;
mod sled_store;

use async_trait::async_trait;

use crate::dto::{Transaction, TransactionId, TransactionStatus, UserId};

pub use self::memory::MemoryStore;
pub use self::sled_store::SledStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate transaction_id: {0}")]
    DuplicateKey(TransactionId),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("transaction id sequence exhausted")]
    SequenceExhausted,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Decides from a record's current status whether an update may proceed.
pub type StatusGuard = dyn Fn(TransactionStatus) -> bool + Send + Sync;

/// Result of a conditional status update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Transaction),
    NotFound,
    /// The record exists but the guard refused its current status.
    /// Carries the record as it currently stands.
    Conflict(Transaction),
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Inserts a new record. Fails with [`StoreError::DuplicateKey`] when the
    /// id is already taken.
    async fn insert(&self, transaction: Transaction) -> StoreResult<()>;

    /// The record with the highest `transaction_id`, if any.
    async fn find_latest(&self) -> StoreResult<Option<Transaction>>;

    async fn find_by_id(&self, id: TransactionId) -> StoreResult<Option<Transaction>>;

    async fn find_by_user(&self, user: UserId) -> StoreResult<Vec<Transaction>>;

    /// Sets `status` on the record with `id` if `allowed` accepts its
    /// current status. The check and the write are atomic.
    async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        allowed: &StatusGuard,
    ) -> StoreResult<UpdateOutcome>;
}

#[async_trait]
pub trait SequenceGenerator: Send + Sync {
    /// Atomically reserves the next transaction id. Starts at 1 and fails
    /// with [`StoreError::SequenceExhausted`] rather than wrapping.
    async fn next_id(&self) -> StoreResult<TransactionId>;
}
