//! Postgres-backed credit ledger.
//!
//! Each mutation runs in one SQL transaction: lock the account row, verify,
//! move the balance, append the transaction row, commit. `balance_after` is
//! therefore always reconstructible from the log alone.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE credit_accounts (
//!     user_id TEXT PRIMARY KEY,
//!     balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0)
//! );
//! CREATE TABLE credit_transactions (
//!     id            UUID PRIMARY KEY,
//!     user_id       TEXT NOT NULL,
//!     amount        BIGINT NOT NULL,
//!     balance_after BIGINT NOT NULL,
//!     kind          TEXT NOT NULL,
//!     metadata      JSONB NOT NULL,
//!     created_at    TIMESTAMPTZ NOT NULL
//! );
//! CREATE INDEX credit_transactions_user_idx ON credit_transactions (user_id, created_at);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use arcana_core::UserId;
use arcana_ledger::{CreditLedger, CreditTransaction, LedgerError, TransactionType, READING_COST};

#[derive(Debug, Clone)]
pub struct PostgresCreditLedger {
    pool: PgPool,
}

impl PostgresCreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> LedgerError {
    LedgerError::storage(format!("{operation}: {e}"))
}

fn kind_to_str(kind: TransactionType) -> &'static str {
    match kind {
        TransactionType::Debit => "DEBIT",
        TransactionType::Topup => "TOPUP",
        TransactionType::Refund => "REFUND",
    }
}

fn kind_from_str(s: &str) -> Result<TransactionType, LedgerError> {
    match s {
        "DEBIT" => Ok(TransactionType::Debit),
        "TOPUP" => Ok(TransactionType::Topup),
        "REFUND" => Ok(TransactionType::Refund),
        other => Err(LedgerError::storage(format!("unknown transaction kind: {other}"))),
    }
}

fn row_to_transaction(row: &PgRow) -> Result<CreditTransaction, LedgerError> {
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| map_sqlx_error("read user_id", e))?;
    let kind: String = row
        .try_get("kind")
        .map_err(|e| map_sqlx_error("read kind", e))?;

    Ok(CreditTransaction {
        id: row.try_get::<Uuid, _>("id").map_err(|e| map_sqlx_error("read id", e))?,
        user_id: UserId::new(user_id)
            .map_err(|e| LedgerError::storage(format!("malformed user_id in row: {e}")))?,
        amount: row
            .try_get("amount")
            .map_err(|e| map_sqlx_error("read amount", e))?,
        balance_after: row
            .try_get("balance_after")
            .map_err(|e| map_sqlx_error("read balance_after", e))?,
        kind: kind_from_str(&kind)?,
        metadata: row
            .try_get("metadata")
            .map_err(|e| map_sqlx_error("read metadata", e))?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| map_sqlx_error("read created_at", e))?,
    })
}

/// Lock (creating if absent) the account row and return its balance.
async fn lock_account(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &UserId,
) -> Result<i64, LedgerError> {
    sqlx::query("INSERT INTO credit_accounts (user_id, balance) VALUES ($1, 0) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("ensure_account", e))?;

    let row = sqlx::query("SELECT balance FROM credit_accounts WHERE user_id = $1 FOR UPDATE")
        .bind(user_id.as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_account", e))?;

    row.try_get("balance")
        .map_err(|e| map_sqlx_error("read balance", e))
}

async fn write_mutation(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &UserId,
    amount: i64,
    new_balance: i64,
    kind: TransactionType,
    metadata: JsonValue,
) -> Result<CreditTransaction, LedgerError> {
    sqlx::query("UPDATE credit_accounts SET balance = $2 WHERE user_id = $1")
        .bind(user_id.as_str())
        .bind(new_balance)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_balance", e))?;

    let entry = CreditTransaction::new(user_id.clone(), amount, new_balance, kind, metadata);

    sqlx::query(
        r#"
        INSERT INTO credit_transactions (id, user_id, amount, balance_after, kind, metadata, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(entry.user_id.as_str())
    .bind(entry.amount)
    .bind(entry.balance_after)
    .bind(kind_to_str(entry.kind))
    .bind(&entry.metadata)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_transaction", e))?;

    Ok(entry)
}

#[async_trait]
impl CreditLedger for PostgresCreditLedger {
    async fn balance(&self, user_id: &UserId) -> Result<i64, LedgerError> {
        let row = sqlx::query("SELECT balance FROM credit_accounts WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_balance", e))?;

        match row {
            Some(row) => row
                .try_get("balance")
                .map_err(|e| map_sqlx_error("read balance", e)),
            None => Ok(0),
        }
    }

    async fn debit(
        &self,
        user_id: &UserId,
        metadata: JsonValue,
    ) -> Result<CreditTransaction, LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let balance = lock_account(&mut tx, user_id).await?;
        if balance < READING_COST {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(LedgerError::InsufficientCredits { balance });
        }

        let entry = write_mutation(
            &mut tx,
            user_id,
            -READING_COST,
            balance - READING_COST,
            TransactionType::Debit,
            metadata,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(entry)
    }

    async fn topup(
        &self,
        user_id: &UserId,
        amount: i64,
        metadata: JsonValue,
    ) -> Result<CreditTransaction, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let balance = lock_account(&mut tx, user_id).await?;
        let entry = write_mutation(
            &mut tx,
            user_id,
            amount,
            balance + amount,
            TransactionType::Topup,
            metadata,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(entry)
    }

    async fn refund(
        &self,
        user_id: &UserId,
        amount: i64,
        reason: &str,
        metadata: JsonValue,
    ) -> Result<CreditTransaction, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let balance = lock_account(&mut tx, user_id).await?;
        let entry = write_mutation(
            &mut tx,
            user_id,
            amount,
            balance + amount,
            TransactionType::Refund,
            json!({ "reason": reason, "details": metadata }),
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(entry)
    }

    async fn transactions(&self, user_id: &UserId) -> Result<Vec<CreditTransaction>, LedgerError> {
        let rows = sqlx::query(
            "SELECT * FROM credit_transactions WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_transactions", e))?;

        rows.iter().map(row_to_transaction).collect()
    }
}
