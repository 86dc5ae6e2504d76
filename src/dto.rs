use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TransactionId = u64;
pub type UserId = u64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    /// Transitions allowed by the lifecycle: `PENDING` may move to either
    /// `COMPLETED` or `FAILED`, nothing else.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// A stored transaction as returned by every ledger operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    #[serde(with = "amount")]
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub user: UserId,
    pub timestamp: DateTime<Utc>,
    pub status: TransactionStatus,
}

/// Body of `POST /api/transactions` and one row of an import file.
///
/// Every field is optional so that presence is checked by the ledger and
/// reported with a single validation message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateTransaction {
    #[serde(default, deserialize_with = "deserialize_decimal_4dp")]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub transaction_type: Option<TransactionType>,
    #[serde(default)]
    pub user: Option<UserId>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ListTransactionsQuery {
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: Option<TransactionStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionList {
    pub transactions: Vec<Transaction>,
}

/// Flat CSV representation of a transaction used by exports.
#[derive(Debug, Serialize, PartialEq)]
pub struct TransactionRow {
    pub transaction_id: TransactionId,
    pub user: UserId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub timestamp: String,
}

impl From<&Transaction> for TransactionRow {
    fn from(transaction: &Transaction) -> Self {
        Self {
            transaction_id: transaction.transaction_id,
            user: transaction.user,
            transaction_type: transaction.transaction_type,
            amount: transaction.amount.normalize(),
            status: transaction.status,
            timestamp: transaction.timestamp.to_rfc3339(),
        }
    }
}

fn deserialize_decimal_4dp<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Amount(#[serde(with = "amount")] Decimal);

    Option::<Amount>::deserialize(deserializer).map(|opt_dec| {
        opt_dec.map(|Amount(dec)| dec.round_dp_with_strategy(4, RoundingStrategy::ToZero))
    })
}

/// Amounts travel as plain JSON numbers: integers when whole, floats
/// otherwise. Floats are read back through their shortest decimal text,
/// so any amount with at most 15 significant digits survives the trip.
mod amount {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::Decimal;
    use serde::de::{self, Deserializer, Visitor};
    use serde::ser::{Error as _, Serializer};
    use std::fmt;
    use std::str::FromStr;

    pub fn serialize<S>(amount: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let amount = amount.normalize();
        if amount.scale() == 0 {
            if let Some(whole) = amount.to_i64() {
                return serializer.serialize_i64(whole);
            }
        }
        // Parsing the decimal text picks the nearest f64.
        let value = f64::from_str(&amount.to_string())
            .map_err(|e| S::Error::custom(format!("amount {} is not representable: {}", amount, e)))?;
        serializer.serialize_f64(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Decimal;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a decimal number or numeric string")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Decimal, E> {
            Ok(Decimal::from(value))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Decimal, E> {
            Ok(Decimal::from(value))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<Decimal, E> {
            Decimal::from_str(&value.to_string())
                .map_err(|_| E::invalid_value(de::Unexpected::Float(value), &self))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Decimal, E> {
            Decimal::from_str(value.trim())
                .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))
        }
    }
}
