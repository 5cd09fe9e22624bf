//! Postgres-backed prediction store.
//!
//! One row per job. Stage outputs are stored as JSONB so the record mirrors
//! the domain type without a column per narrative field. Every write is a
//! `WHERE job_id = $1` targeted update; the state machine is enforced inside
//! a row-locking transaction by the same [`PredictionPatch::apply`] the
//! in-memory store uses.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE predictions (
//!     job_id         TEXT PRIMARY KEY,
//!     user_id        TEXT,
//!     question       TEXT NOT NULL,
//!     status         TEXT NOT NULL,
//!     analysis       JSONB,
//!     selected_cards JSONB,
//!     reading        JSONB,
//!     error          TEXT,
//!     created_at     TIMESTAMPTZ NOT NULL,
//!     completed_at   TIMESTAMPTZ
//! );
//! CREATE INDEX predictions_user_created_idx ON predictions (user_id, created_at DESC);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use arcana_core::{JobId, Prediction, PredictionStatus, UserId};

use super::{PredictionPatch, PredictionStore, StoreError};

#[derive(Debug, Clone)]
pub struct PostgresPredictionStore {
    pool: PgPool,
}

impl PostgresPredictionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> StoreError {
    StoreError::storage(format!("{operation}: {e}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn status_to_str(status: PredictionStatus) -> &'static str {
    match status {
        PredictionStatus::Pending => "PENDING",
        PredictionStatus::Processing => "PROCESSING",
        PredictionStatus::Completed => "COMPLETED",
        PredictionStatus::Failed => "FAILED",
    }
}

fn status_from_str(s: &str) -> Result<PredictionStatus, StoreError> {
    match s {
        "PENDING" => Ok(PredictionStatus::Pending),
        "PROCESSING" => Ok(PredictionStatus::Processing),
        "COMPLETED" => Ok(PredictionStatus::Completed),
        "FAILED" => Ok(PredictionStatus::Failed),
        other => Err(StoreError::storage(format!("unknown status in row: {other}"))),
    }
}

fn row_to_prediction(row: &PgRow) -> Result<Prediction, StoreError> {
    let job_id: String = row
        .try_get("job_id")
        .map_err(|e| map_sqlx_error("read job_id", e))?;
    let job_id: JobId = job_id
        .parse()
        .map_err(|e| StoreError::storage(format!("malformed job_id in row: {e}")))?;

    let user_id: Option<String> = row
        .try_get("user_id")
        .map_err(|e| map_sqlx_error("read user_id", e))?;
    let user_id = user_id
        .map(UserId::new)
        .transpose()
        .map_err(|e| StoreError::storage(format!("malformed user_id in row: {e}")))?;

    let status: String = row
        .try_get("status")
        .map_err(|e| map_sqlx_error("read status", e))?;

    let analysis: Option<serde_json::Value> = row
        .try_get("analysis")
        .map_err(|e| map_sqlx_error("read analysis", e))?;
    let selected_cards: Option<serde_json::Value> = row
        .try_get("selected_cards")
        .map_err(|e| map_sqlx_error("read selected_cards", e))?;
    let reading: Option<serde_json::Value> = row
        .try_get("reading")
        .map_err(|e| map_sqlx_error("read reading", e))?;

    Ok(Prediction {
        job_id,
        user_id,
        question: row
            .try_get("question")
            .map_err(|e| map_sqlx_error("read question", e))?,
        status: status_from_str(&status)?,
        analysis: analysis
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| StoreError::storage(format!("malformed analysis in row: {e}")))?,
        selected_cards: selected_cards
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| StoreError::storage(format!("malformed selected_cards in row: {e}")))?,
        reading: reading
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| StoreError::storage(format!("malformed reading in row: {e}")))?,
        error: row
            .try_get("error")
            .map_err(|e| map_sqlx_error("read error", e))?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| map_sqlx_error("read created_at", e))?,
        completed_at: row
            .try_get::<Option<DateTime<Utc>>, _>("completed_at")
            .map_err(|e| map_sqlx_error("read completed_at", e))?,
    })
}

fn to_json<T: serde::Serialize>(value: &Option<T>) -> Result<Option<serde_json::Value>, StoreError> {
    value
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| StoreError::storage(format!("serialize: {e}")))
}

#[async_trait]
impl PredictionStore for PostgresPredictionStore {
    async fn create(&self, prediction: Prediction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO predictions (
                job_id, user_id, question, status,
                analysis, selected_cards, reading, error,
                created_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(prediction.job_id.as_str())
        .bind(prediction.user_id.as_ref().map(|u| u.as_str()))
        .bind(&prediction.question)
        .bind(status_to_str(prediction.status))
        .bind(to_json(&prediction.analysis)?)
        .bind(to_json(&prediction.selected_cards)?)
        .bind(to_json(&prediction.reading)?)
        .bind(&prediction.error)
        .bind(prediction.created_at)
        .bind(prediction.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::AlreadyExists(prediction.job_id.clone())
            } else {
                map_sqlx_error("insert_prediction", e)
            }
        })?;

        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<Prediction>, StoreError> {
        let row = sqlx::query("SELECT * FROM predictions WHERE job_id = $1")
            .bind(job_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_prediction", e))?;

        row.as_ref().map(row_to_prediction).transpose()
    }

    async fn update(
        &self,
        job_id: &JobId,
        patch: PredictionPatch,
    ) -> Result<Prediction, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query("SELECT * FROM predictions WHERE job_id = $1 FOR UPDATE")
            .bind(job_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_prediction", e))?
            .ok_or_else(|| StoreError::NotFound(job_id.clone()))?;

        let mut prediction = row_to_prediction(&row)?;
        patch.apply(&mut prediction)?;

        sqlx::query(
            r#"
            UPDATE predictions
            SET status = $2,
                analysis = $3,
                selected_cards = $4,
                reading = $5,
                error = $6,
                completed_at = $7
            WHERE job_id = $1
            "#,
        )
        .bind(job_id.as_str())
        .bind(status_to_str(prediction.status))
        .bind(to_json(&prediction.analysis)?)
        .bind(to_json(&prediction.selected_cards)?)
        .bind(to_json(&prediction.reading)?)
        .bind(&prediction.error)
        .bind(prediction.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_prediction", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(prediction)
    }

    async fn latest_for_user(&self, user_id: &UserId) -> Result<Option<Prediction>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM predictions
            WHERE user_id = $1
            ORDER BY created_at DESC, job_id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_for_user", e))?;

        row.as_ref().map(row_to_prediction).transpose()
    }
}
