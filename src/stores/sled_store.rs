//! Durable transaction storage on sled.
//!
//! ## Tree Layout
//!
//! | Tree           | Key                          | Value                  |
//! |----------------|------------------------------|------------------------|
//! | `transactions` | `transaction_id` (8B BE)     | `json(Transaction)`    |
//! | `metadata`     | `transaction_seq`            | last issued id (8B BE) |
//!
//! Ids are stored big-endian so that sled's lexicographic ordering matches
//! numeric ordering, which makes `last()` the highest id.
//!
//! The sequence counter is advanced with a `compare_and_swap` loop, so
//! concurrent callers never observe the same id. A counter that does not
//! decode is an error, never a restart from zero. Inserts go
//! through `compare_and_swap` against an absent key, which is how duplicate
//! ids are refused.

use async_trait::async_trait;
use sled::{Db, IVec, Tree};
use std::path::Path;

use super::{
    SequenceGenerator, StatusGuard, StoreError, StoreResult, TransactionStore, UpdateOutcome,
};
use crate::dto::{Transaction, TransactionId, TransactionStatus, UserId};

const META_TRANSACTION_SEQ: &[u8] = b"transaction_seq";

#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    transactions: Tree,
    metadata: Tree,
}

impl SledStore {
    /// Opens or creates a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// A store that is discarded when the last handle is dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let store = Self {
            transactions: db.open_tree("transactions")?,
            metadata: db.open_tree("metadata")?,
            db,
        };
        store.seed_sequence()?;
        Ok(store)
    }

    /// Raises the sequence counter to at least the highest stored id, so
    /// a database written without a counter still continues after its
    /// last record.
    fn seed_sequence(&self) -> StoreResult<()> {
        let latest = match self.transactions.last()? {
            Some((key, _)) => decode_id(&key)?,
            None => 0,
        };
        self.advance_sequence(|current| Ok(current.max(latest)))?;
        Ok(())
    }

    /// Replaces the stored counter with `next(current)` and returns the new
    /// value. A missing counter reads as 0.
    fn advance_sequence<F>(&self, next: F) -> StoreResult<TransactionId>
    where
        F: Fn(TransactionId) -> StoreResult<TransactionId>,
    {
        loop {
            let old = self.metadata.get(META_TRANSACTION_SEQ)?;
            let current = match &old {
                Some(bytes) => decode_id(bytes)?,
                None => 0,
            };
            let updated = next(current)?;
            if self
                .metadata
                .compare_and_swap(
                    META_TRANSACTION_SEQ,
                    old.as_ref(),
                    Some(&updated.to_be_bytes()[..]),
                )?
                .is_ok()
            {
                return Ok(updated);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[async_trait]
impl TransactionStore for SledStore {
    async fn insert(&self, transaction: Transaction) -> StoreResult<()> {
        let key = transaction.transaction_id.to_be_bytes();
        let bytes = encode(&transaction)?;
        if self
            .transactions
            .compare_and_swap(key, None::<&[u8]>, Some(bytes))?
            .is_err()
        {
            return Err(StoreError::DuplicateKey(transaction.transaction_id));
        }
        self.db.flush_async().await?;
        Ok(())
    }

    async fn find_latest(&self) -> StoreResult<Option<Transaction>> {
        match self.transactions.last()? {
            Some((_, bytes)) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        match self.transactions.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn find_by_user(&self, user: UserId) -> StoreResult<Vec<Transaction>> {
        let mut found = Vec::new();
        for entry in self.transactions.iter() {
            let (_, bytes) = entry?;
            let transaction = decode(&bytes)?;
            if transaction.user == user {
                found.push(transaction);
            }
        }
        Ok(found)
    }

    async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        allowed: &StatusGuard,
    ) -> StoreResult<UpdateOutcome> {
        let key = id.to_be_bytes();
        loop {
            let Some(current) = self.transactions.get(key)? else {
                return Ok(UpdateOutcome::NotFound);
            };
            let mut transaction = decode(&current)?;
            if !allowed(transaction.status) {
                return Ok(UpdateOutcome::Conflict(transaction));
            }
            transaction.status = status;
            let updated = encode(&transaction)?;
            // Lost the race against another writer: re-read and re-check.
            if self
                .transactions
                .compare_and_swap(key, Some(&current), Some(updated))?
                .is_ok()
            {
                self.db.flush_async().await?;
                return Ok(UpdateOutcome::Updated(transaction));
            }
        }
    }
}

#[async_trait]
impl SequenceGenerator for SledStore {
    async fn next_id(&self) -> StoreResult<TransactionId> {
        self.advance_sequence(|current| {
            current
                .checked_add(1)
                .ok_or(StoreError::SequenceExhausted)
        })
    }
}

fn encode(transaction: &Transaction) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(transaction).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode(bytes: &IVec) -> StoreResult<Transaction> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_id(bytes: &[u8]) -> StoreResult<TransactionId> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Serialization(format!("bad id width: {}", bytes.len())))?;
    Ok(TransactionId::from_be_bytes(raw))
}
