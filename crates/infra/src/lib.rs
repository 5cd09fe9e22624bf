//! `arcana-infra` — infrastructure for the prediction workflow.
//!
//! ## Components
//!
//! - `store`: durable CRUD over prediction records, the single source of
//!   truth for job status (in-memory and Postgres implementations)
//! - `ledger`: Postgres credit ledger (the in-memory one lives in
//!   `arcana-ledger` next to the contract)
//! - `retry`: bounded retry with backoff around any fallible async operation
//! - `rate_limit`: cooldown checks derived from the store's history
//! - `spawner`: detached background-task scheduling seam
//! - `workflow`: the orchestrator driving a job through the four stages,
//!   checkpointing after each one and compensating on late failures

pub mod ledger;
pub mod rate_limit;
pub mod retry;
pub mod spawner;
pub mod store;
pub mod workflow;

pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use spawner::{SpawnError, TaskSpawner, TokioSpawner};
pub use store::{InMemoryPredictionStore, PredictionPatch, PredictionStore, StoreError};
pub use workflow::{WorkflowConfig, WorkflowError, WorkflowOrchestrator};
