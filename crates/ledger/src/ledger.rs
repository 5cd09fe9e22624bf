//! Credit ledger contract and the in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use arcana_core::UserId;

use crate::transaction::{CreditTransaction, LedgerError, TransactionType, READING_COST};

/// Atomic balance mutation + immutable transaction log.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Live balance; 0 for users the ledger has never seen.
    async fn balance(&self, user_id: &UserId) -> Result<i64, LedgerError>;

    async fn has_sufficient_balance(&self, user_id: &UserId) -> Result<bool, LedgerError> {
        Ok(self.balance(user_id).await? >= READING_COST)
    }

    /// Debit one reading's cost. Atomic read-verify-decrement-append; fails
    /// with `InsufficientCredits` and writes nothing if the balance is short.
    async fn debit(
        &self,
        user_id: &UserId,
        metadata: JsonValue,
    ) -> Result<CreditTransaction, LedgerError>;

    /// Fund an account. `amount` must be positive.
    async fn topup(
        &self,
        user_id: &UserId,
        amount: i64,
        metadata: JsonValue,
    ) -> Result<CreditTransaction, LedgerError>;

    /// Compensating increment; used only to undo a debit whose job produced
    /// no recorded result. `amount` must be positive.
    async fn refund(
        &self,
        user_id: &UserId,
        amount: i64,
        reason: &str,
        metadata: JsonValue,
    ) -> Result<CreditTransaction, LedgerError>;

    /// All rows for a user, oldest first.
    async fn transactions(&self, user_id: &UserId) -> Result<Vec<CreditTransaction>, LedgerError>;
}

#[derive(Debug, Default)]
struct Account {
    balance: i64,
    log: Vec<CreditTransaction>,
}

/// In-memory ledger for dev/test.
///
/// One mutex over all accounts: every mutation's read-check-write-append runs
/// inside a single critical section, which is the whole atomicity story here.
#[derive(Debug, Default)]
pub struct InMemoryCreditLedger {
    accounts: Mutex<HashMap<UserId, Account>>,
}

impl InMemoryCreditLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CreditLedger for InMemoryCreditLedger {
    async fn balance(&self, user_id: &UserId) -> Result<i64, LedgerError> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.get(user_id).map(|a| a.balance).unwrap_or(0))
    }

    async fn debit(
        &self,
        user_id: &UserId,
        metadata: JsonValue,
    ) -> Result<CreditTransaction, LedgerError> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.entry(user_id.clone()).or_default();

        if account.balance < READING_COST {
            return Err(LedgerError::InsufficientCredits {
                balance: account.balance,
            });
        }

        account.balance -= READING_COST;
        let tx = CreditTransaction::new(
            user_id.clone(),
            -READING_COST,
            account.balance,
            TransactionType::Debit,
            metadata,
        );
        account.log.push(tx.clone());
        Ok(tx)
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

        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.entry(user_id.clone()).or_default();

        account.balance += amount;
        let tx = CreditTransaction::new(
            user_id.clone(),
            amount,
            account.balance,
            TransactionType::Topup,
            metadata,
        );
        account.log.push(tx.clone());
        Ok(tx)
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

        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.entry(user_id.clone()).or_default();

        account.balance += amount;
        let tx = CreditTransaction::new(
            user_id.clone(),
            amount,
            account.balance,
            TransactionType::Refund,
            json!({ "reason": reason, "details": metadata }),
        );
        account.log.push(tx.clone());
        Ok(tx)
    }

    async fn transactions(&self, user_id: &UserId) -> Result<Vec<CreditTransaction>, LedgerError> {
        let accounts = self.accounts.lock().unwrap();
        Ok(accounts.get(user_id).map(|a| a.log.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[tokio::test]
    async fn debit_decrements_and_logs() {
        let ledger = InMemoryCreditLedger::new();
        let u = user("u1");
        ledger.topup(&u, 2, json!({})).await.unwrap();

        let tx = ledger.debit(&u, json!({"job_id": "job-1-abcdefghi"})).await.unwrap();
        assert_eq!(tx.amount, -1);
        assert_eq!(tx.balance_after, 1);
        assert_eq!(tx.kind, TransactionType::Debit);
        assert_eq!(ledger.balance(&u).await.unwrap(), 1);

        let log = ledger.transactions(&u).await.unwrap();
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn debit_on_empty_account_writes_nothing() {
        let ledger = InMemoryCreditLedger::new();
        let u = user("broke");

        let err = ledger.debit(&u, json!({})).await.unwrap_err();
        assert_eq!(err, LedgerError::InsufficientCredits { balance: 0 });
        assert!(ledger.transactions(&u).await.unwrap().is_empty());
        assert_eq!(ledger.balance(&u).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn refund_restores_a_debit() {
        let ledger = InMemoryCreditLedger::new();
        let u = user("u2");
        ledger.topup(&u, 1, json!({})).await.unwrap();
        ledger.debit(&u, json!({})).await.unwrap();
        assert_eq!(ledger.balance(&u).await.unwrap(), 0);

        let tx = ledger
            .refund(&u, 1, "system error", json!({"job_id": "job-1-abcdefghi"}))
            .await
            .unwrap();
        assert_eq!(tx.kind, TransactionType::Refund);
        assert_eq!(tx.metadata["reason"], "system error");
        assert_eq!(ledger.balance(&u).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn non_positive_topups_and_refunds_are_rejected() {
        let ledger = InMemoryCreditLedger::new();
        let u = user("u3");
        assert!(ledger.topup(&u, 0, json!({})).await.is_err());
        assert!(ledger.topup(&u, -5, json!({})).await.is_err());
        assert!(ledger.refund(&u, 0, "r", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn accounts_are_isolated() {
        let ledger = InMemoryCreditLedger::new();
        ledger.topup(&user("a"), 5, json!({})).await.unwrap();
        assert_eq!(ledger.balance(&user("b")).await.unwrap(), 0);
        assert!(!ledger.has_sufficient_balance(&user("b")).await.unwrap());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Topup(i64),
        Debit,
        Refund(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..20).prop_map(Op::Topup),
            Just(Op::Debit),
            (1i64..3).prop_map(Op::Refund),
        ]
    }

    proptest! {
        /// Conservation: after any op sequence, the live balance equals the
        /// sum of all logged amounts, and never goes negative.
        #[test]
        fn ledger_reconciles_from_its_log(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let ledger = InMemoryCreditLedger::new();
                let u = user("prop");

                for op in ops {
                    // Failed ops must leave no trace; ignore their results.
                    match op {
                        Op::Topup(n) => { let _ = ledger.topup(&u, n, json!({})).await; }
                        Op::Debit => { let _ = ledger.debit(&u, json!({})).await; }
                        Op::Refund(n) => { let _ = ledger.refund(&u, n, "compensation", json!({})).await; }
                    }

                    let balance = ledger.balance(&u).await.unwrap();
                    prop_assert!(balance >= 0);

                    let log = ledger.transactions(&u).await.unwrap();
                    let sum: i64 = log.iter().map(|t| t.amount).sum();
                    prop_assert_eq!(sum, balance);
                    if let Some(last) = log.last() {
                        prop_assert_eq!(last.balance_after, balance);
                    }
                }
                Ok(())
            })?;
        }
    }
}
