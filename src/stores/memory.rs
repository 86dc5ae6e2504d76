//! In-memory transaction storage.
//!
//! Records live in a `BTreeMap` keyed by `transaction_id`, so the store-native
//! order of every listing is ascending id. The id sequence is an atomic
//! counter, independent of the record map.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{
    SequenceGenerator, StatusGuard, StoreError, StoreResult, TransactionStore, UpdateOutcome,
};
use crate::dto::{Transaction, TransactionId, TransactionStatus, UserId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    transactions: RwLock<BTreeMap<TransactionId, Transaction>>,
    /// Last id handed out by [`SequenceGenerator::next_id`].
    sequence: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert(&self, transaction: Transaction) -> StoreResult<()> {
        let mut transactions = self.transactions.write();
        if transactions.contains_key(&transaction.transaction_id) {
            return Err(StoreError::DuplicateKey(transaction.transaction_id));
        }
        transactions.insert(transaction.transaction_id, transaction);
        Ok(())
    }

    async fn find_latest(&self) -> StoreResult<Option<Transaction>> {
        Ok(self
            .transactions
            .read()
            .last_key_value()
            .map(|(_, transaction)| transaction.clone()))
    }

    async fn find_by_id(&self, id: TransactionId) -> StoreResult<Option<Transaction>> {
        Ok(self.transactions.read().get(&id).cloned())
    }

    async fn find_by_user(&self, user: UserId) -> StoreResult<Vec<Transaction>> {
        Ok(self
            .transactions
            .read()
            .values()
            .filter(|transaction| transaction.user == user)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        allowed: &StatusGuard,
    ) -> StoreResult<UpdateOutcome> {
        let mut transactions = self.transactions.write();
        let Some(transaction) = transactions.get_mut(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if !allowed(transaction.status) {
            return Ok(UpdateOutcome::Conflict(transaction.clone()));
        }
        transaction.status = status;
        Ok(UpdateOutcome::Updated(transaction.clone()))
    }
}

#[async_trait]
impl SequenceGenerator for MemoryStore {
    async fn next_id(&self) -> StoreResult<TransactionId> {
        self.sequence
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| last.checked_add(1))
            .map(|last| last + 1)
            .map_err(|_| StoreError::SequenceExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::TransactionType;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn any_status(_: TransactionStatus) -> bool {
        true
    }

    fn only_pending(current: TransactionStatus) -> bool {
        current == TransactionStatus::Pending
    }

    fn transaction(id: TransactionId, user: UserId, amount: Decimal) -> Transaction {
        Transaction {
            transaction_id: id,
            amount,
            transaction_type: TransactionType::Deposit,
            user,
            timestamp: Utc::now(),
            status: TransactionStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.find_latest().await.unwrap(), None);
        assert_eq!(store.find_by_id(1).await.unwrap(), None);
        assert!(store.find_by_user(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryStore::new();
        store.insert(transaction(1, 7, dec!(100))).await.unwrap();

        let found = store.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(found.user, 7);
        assert_eq!(found.amount, dec!(100));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = MemoryStore::new();
        store.insert(transaction(1, 1, dec!(100))).await.unwrap();

        let result = store.insert(transaction(1, 2, dec!(200))).await;
        assert!(matches!(result, Err(StoreError::DuplicateKey(1))));

        // Original record remains unchanged
        let found = store.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(found.user, 1);
        assert_eq!(found.amount, dec!(100));
    }

    #[tokio::test]
    async fn test_find_latest_returns_highest_id() {
        let store = MemoryStore::new();
        store.insert(transaction(2, 1, dec!(1))).await.unwrap();
        store.insert(transaction(5, 1, dec!(1))).await.unwrap();
        store.insert(transaction(3, 1, dec!(1))).await.unwrap();

        let latest = store.find_latest().await.unwrap().unwrap();
        assert_eq!(latest.transaction_id, 5);
    }

    #[tokio::test]
    async fn test_find_by_user_filters() {
        let store = MemoryStore::new();
        store.insert(transaction(1, 7, dec!(1))).await.unwrap();
        store.insert(transaction(2, 8, dec!(2))).await.unwrap();
        store.insert(transaction(3, 7, dec!(3))).await.unwrap();

        let ids: Vec<_> = store
            .find_by_user(7)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.transaction_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_update_status_unconditional() {
        let store = MemoryStore::new();
        store.insert(transaction(1, 1, dec!(1))).await.unwrap();

        let outcome = store
            .update_status(1, TransactionStatus::Completed, &any_status)
            .await
            .unwrap();
        let UpdateOutcome::Updated(updated) = outcome else {
            panic!("expected update");
        };
        assert_eq!(updated.status, TransactionStatus::Completed);

        // A guard accepting every status lets the write through
        let outcome = store
            .update_status(1, TransactionStatus::Failed, &any_status)
            .await
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Updated(t) if t.status == TransactionStatus::Failed));
    }

    #[tokio::test]
    async fn test_update_status_conflict_leaves_record() {
        let store = MemoryStore::new();
        store.insert(transaction(1, 1, dec!(1))).await.unwrap();
        store
            .update_status(1, TransactionStatus::Completed, &only_pending)
            .await
            .unwrap();

        let outcome = store
            .update_status(1, TransactionStatus::Failed, &only_pending)
            .await
            .unwrap();
        assert!(
            matches!(outcome, UpdateOutcome::Conflict(t) if t.status == TransactionStatus::Completed)
        );
        let stored = store.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_update_status_missing() {
        let store = MemoryStore::new();
        let outcome = store
            .update_status(999, TransactionStatus::Completed, &any_status)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_sequence_starts_at_one() {
        let store = MemoryStore::new();
        assert_eq!(store.next_id().await.unwrap(), 1);
        assert_eq!(store.next_id().await.unwrap(), 2);
        assert_eq!(store.next_id().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sequence_exhaustion_is_an_error() {
        let store = MemoryStore {
            sequence: AtomicU64::new(u64::MAX - 1),
            ..MemoryStore::default()
        };
        assert_eq!(store.next_id().await.unwrap(), u64::MAX);

        let result = store.next_id().await;
        assert!(matches!(result, Err(StoreError::SequenceExhausted)));
        // The counter stays put instead of wrapping to zero
        assert!(matches!(store.next_id().await, Err(StoreError::SequenceExhausted)));
    }
}
