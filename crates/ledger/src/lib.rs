//! `arcana-ledger` — credit accounting.
//!
//! Balance mutation and its transaction-log row always commit together, in
//! one atomic unit, so the live balance is reconstructible from the log
//! alone. Rows are append-only; `refund` exists solely as compensation for a
//! debit whose job produced no recorded result.

pub mod ledger;
pub mod transaction;

pub use ledger::{CreditLedger, InMemoryCreditLedger};
pub use transaction::{CreditTransaction, LedgerError, TransactionType, READING_COST};
