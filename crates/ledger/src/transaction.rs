//! Ledger row types and errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use arcana_core::UserId;

/// Cost of one reading, in credit units.
pub const READING_COST: i64 = 1;

/// Kind of ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Debit,
    Topup,
    Refund,
}

/// Immutable ledger entry.
///
/// `amount` is signed (negative for debits); `balance_after` snapshots the
/// live balance the moment the row was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub amount: i64,
    pub balance_after: i64,
    pub kind: TransactionType,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    pub fn new(
        user_id: UserId,
        amount: i64,
        balance_after: i64,
        kind: TransactionType,
        metadata: JsonValue,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            amount,
            balance_after,
            kind,
            metadata,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Balance below the debit amount; nothing was written.
    #[error("insufficient credits: balance is {balance}")]
    InsufficientCredits { balance: i64 },

    /// Topup/refund amounts must be positive.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// Backing storage failed.
    #[error("ledger storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
