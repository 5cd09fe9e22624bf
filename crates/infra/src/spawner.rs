//! Background task scheduling seam.
//!
//! The submit path must schedule the orchestrator as a detached task whose
//! lifetime outlives the HTTP response. The concrete runtime is swappable
//! behind this trait; production wiring uses [`TokioSpawner`].

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// A detached unit of background work.
pub type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Error, Clone)]
#[error("failed to schedule background task: {0}")]
pub struct SpawnError(pub String);

pub trait TaskSpawner: Send + Sync {
    /// Schedule a task to run to completion, decoupled from the caller.
    fn submit(&self, task: BoxedTask) -> Result<(), SpawnError>;
}

/// Spawns detached tasks on the ambient tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl TokioSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl TaskSpawner for TokioSpawner {
    fn submit(&self, task: BoxedTask) -> Result<(), SpawnError> {
        let handle =
            tokio::runtime::Handle::try_current().map_err(|e| SpawnError(e.to_string()))?;
        handle.spawn(task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submitted_task_runs_detached() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let spawner = TokioSpawner::new();

        spawner
            .submit(Box::pin(async move {
                let _ = tx.send(42u32);
            }))
            .unwrap();

        assert_eq!(rx.await.unwrap(), 42);
    }
}
