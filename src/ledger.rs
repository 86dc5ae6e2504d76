use chrono::Utc;
use clap::ValueEnum;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::dto::{
    CreateTransaction, ListTransactionsQuery, Transaction, TransactionId, TransactionStatus,
    TransactionType, UpdateStatusRequest, UserId,
};
use crate::stores::{SequenceGenerator, TransactionStore, UpdateOutcome};
use crate::Error;

const MISSING_FIELDS: &str = "amount, transaction_type, user fields are required.";
const NON_POSITIVE_AMOUNT: &str = "amount must be positive.";
const AMOUNT_TOO_LARGE: &str = "amount must not exceed 99999999999.9999.";
const MISSING_USER_ID: &str = "user_id is required as a query parameter.";
const INVALID_ID: &str = "Invalid transaction_id: Must be a valid number.";
const INVALID_STATUS: &str = "Invalid status value. Must be 'COMPLETED' or 'FAILED'.";

/// Largest accepted amount. Anything with at most 15 significant digits
/// survives a trip through a JSON float unchanged.
const MAX_AMOUNT: Decimal = Decimal::from_parts(2_764_472_319, 232_830, 0, false, 4);

/// Whether `COMPLETED` and `FAILED` are final.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StatusPolicy {
    /// Only `PENDING` transactions may change status.
    #[default]
    Terminal,
    /// Any transaction may be overwritten to `COMPLETED` or `FAILED`.
    Override,
}

impl StatusPolicy {
    /// Whether a record currently in `current` may be moved to `next`.
    pub fn permits(self, current: TransactionStatus, next: TransactionStatus) -> bool {
        match self {
            StatusPolicy::Terminal => current.can_transition_to(next),
            StatusPolicy::Override => next.is_terminal(),
        }
    }
}

/// A create request that passed validation.
#[derive(Debug)]
struct NewTransaction {
    amount: Decimal,
    transaction_type: TransactionType,
    user: UserId,
}

/// Owns the transaction lifecycle: id assignment, creation, lookups and
/// status transitions. Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn TransactionStore>,
    sequence: Arc<dyn SequenceGenerator>,
    policy: StatusPolicy,
}

impl Ledger {
    /// Builds a ledger on a backend that is both store and id sequence.
    pub fn new<B>(backend: Arc<B>) -> Self
    where
        B: TransactionStore + SequenceGenerator + 'static,
    {
        Self::with_parts(backend.clone(), backend)
    }

    pub fn with_parts(
        store: Arc<dyn TransactionStore>,
        sequence: Arc<dyn SequenceGenerator>,
    ) -> Self {
        Self {
            store,
            sequence,
            policy: StatusPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    fn validate_create(request: CreateTransaction) -> Result<NewTransaction, Error> {
        let (Some(amount), Some(transaction_type), Some(user)) =
            (request.amount, request.transaction_type, request.user)
        else {
            return Err(Error::validation(MISSING_FIELDS));
        };
        // Zero amounts and user 0 count as missing.
        if amount.is_zero() || user == 0 {
            return Err(Error::validation(MISSING_FIELDS));
        }
        if amount.is_sign_negative() {
            return Err(Error::validation(NON_POSITIVE_AMOUNT));
        }
        if amount > MAX_AMOUNT {
            return Err(Error::validation(AMOUNT_TOO_LARGE));
        }
        Ok(NewTransaction {
            amount,
            transaction_type,
            user,
        })
    }

    /// Records a new `PENDING` transaction under the next id.
    ///
    /// Validation happens before an id is reserved, so rejected requests
    /// never leave gaps in the sequence.
    pub async fn create(&self, request: CreateTransaction) -> Result<Transaction, Error> {
        let new = Self::validate_create(request)?;
        let transaction_id = self.sequence.next_id().await?;
        let transaction = Transaction {
            transaction_id,
            amount: new.amount,
            transaction_type: new.transaction_type,
            user: new.user,
            timestamp: Utc::now(),
            status: TransactionStatus::Pending,
        };

        if let Err(e) = self.store.insert(transaction.clone()).await {
            tracing::error!(transaction_id, error = %e, "failed to store transaction");
            return Err(e.into());
        }
        tracing::info!(
            transaction_id,
            user = transaction.user,
            transaction_type = ?transaction.transaction_type,
            amount = %transaction.amount,
            "transaction created"
        );
        Ok(transaction)
    }

    /// All transactions of one user in store order. Empty if there are none.
    pub async fn list_by_user(
        &self,
        query: ListTransactionsQuery,
    ) -> Result<Vec<Transaction>, Error> {
        let user_id = query
            .user_id
            .ok_or_else(|| Error::validation(MISSING_USER_ID))?;
        Ok(self.store.find_by_user(user_id).await?)
    }

    pub async fn get_by_id(&self, transaction_id: &str) -> Result<Transaction, Error> {
        let id = parse_transaction_id(transaction_id)?;
        self.store.find_by_id(id).await?.ok_or(Error::NotFound)
    }

    /// Moves a transaction to `COMPLETED` or `FAILED`.
    ///
    /// The store applies the write only if the ledger's [`StatusPolicy`]
    /// permits the move from the record's current status. Under the default
    /// policy that means the record is still `PENDING`.
    pub async fn update_status(
        &self,
        transaction_id: &str,
        request: UpdateStatusRequest,
    ) -> Result<Transaction, Error> {
        let id = parse_transaction_id(transaction_id)?;
        let status = request
            .status
            .filter(|status| status.is_terminal())
            .ok_or_else(|| Error::validation(INVALID_STATUS))?;

        let policy = self.policy;
        let allowed = move |current: TransactionStatus| policy.permits(current, status);
        match self.store.update_status(id, status, &allowed).await? {
            UpdateOutcome::Updated(transaction) => {
                tracing::info!(transaction_id = id, %status, "transaction status updated");
                Ok(transaction)
            }
            UpdateOutcome::NotFound => {
                tracing::debug!(transaction_id = id, "transaction not found for update");
                Err(Error::NotFound)
            }
            UpdateOutcome::Conflict(current) => {
                tracing::warn!(
                    transaction_id = id,
                    current = %current.status,
                    requested = %status,
                    "rejected status transition"
                );
                Err(Error::InvalidTransition {
                    id,
                    current: current.status,
                    requested: status,
                })
            }
        }
    }
}

fn parse_transaction_id(raw: &str) -> Result<TransactionId, Error> {
    raw.trim()
        .parse::<TransactionId>()
        .map_err(|_| Error::validation(INVALID_ID))
}
