//! In-memory prediction store for dev/test.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use arcana_core::{JobId, Prediction, UserId};

use super::{PredictionPatch, PredictionStore, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryPredictionStore {
    predictions: RwLock<HashMap<JobId, Prediction>>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PredictionStore for InMemoryPredictionStore {
    async fn create(&self, prediction: Prediction) -> Result<(), StoreError> {
        let mut predictions = self.predictions.write().unwrap();
        if predictions.contains_key(&prediction.job_id) {
            return Err(StoreError::AlreadyExists(prediction.job_id));
        }
        predictions.insert(prediction.job_id.clone(), prediction);
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<Prediction>, StoreError> {
        let predictions = self.predictions.read().unwrap();
        Ok(predictions.get(job_id).cloned())
    }

    async fn update(
        &self,
        job_id: &JobId,
        patch: PredictionPatch,
    ) -> Result<Prediction, StoreError> {
        let mut predictions = self.predictions.write().unwrap();
        let prediction = predictions
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.clone()))?;
        patch.apply(prediction)?;
        Ok(prediction.clone())
    }

    async fn latest_for_user(&self, user_id: &UserId) -> Result<Option<Prediction>, StoreError> {
        let predictions = self.predictions.read().unwrap();
        Ok(predictions
            .values()
            .filter(|p| p.user_id.as_ref() == Some(user_id))
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.job_id.as_str().cmp(b.job_id.as_str()))
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcana_core::PredictionStatus;
    use chrono::{Duration, Utc};

    fn pending(question: &str, user: Option<&str>) -> Prediction {
        Prediction::new(
            JobId::generate(),
            question,
            user.map(|u| UserId::new(u).unwrap()),
        )
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryPredictionStore::new();
        let p = pending("Will I find love?", Some("u1"));
        let id = p.job_id.clone();

        store.create(p.clone()).await.unwrap();
        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched, p);

        // Unknown ids are simply absent.
        assert!(store.get(&JobId::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = InMemoryPredictionStore::new();
        let p = pending("q", None);
        store.create(p.clone()).await.unwrap();
        assert!(matches!(
            store.create(p).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn update_walks_the_state_machine() {
        let store = InMemoryPredictionStore::new();
        let p = pending("q", None);
        let id = p.job_id.clone();
        store.create(p).await.unwrap();

        let updated = store
            .update(&id, PredictionPatch::status(PredictionStatus::Processing))
            .await
            .unwrap();
        assert_eq!(updated.status, PredictionStatus::Processing);

        let updated = store
            .update(&id, PredictionPatch::failed("stage exhausted retries"))
            .await
            .unwrap();
        assert_eq!(updated.status, PredictionStatus::Failed);
        assert!(updated.completed_at.is_some());
        assert_eq!(updated.error.as_deref(), Some("stage exhausted retries"));
    }

    #[tokio::test]
    async fn illegal_transitions_are_rejected() {
        let store = InMemoryPredictionStore::new();
        let p = pending("q", None);
        let id = p.job_id.clone();
        store.create(p).await.unwrap();

        // PENDING cannot jump straight to COMPLETED.
        let err = store
            .update(
                &id,
                PredictionPatch::status(PredictionStatus::Completed),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));

        // A second writer cannot re-claim a PROCESSING job.
        store
            .update(&id, PredictionPatch::status(PredictionStatus::Processing))
            .await
            .unwrap();
        let err = store
            .update(&id, PredictionPatch::status(PredictionStatus::Processing))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn terminal_records_are_immutable() {
        let store = InMemoryPredictionStore::new();
        let p = pending("q", None);
        let id = p.job_id.clone();
        store.create(p).await.unwrap();
        store
            .update(&id, PredictionPatch::status(PredictionStatus::Processing))
            .await
            .unwrap();
        store
            .update(&id, PredictionPatch::failed("boom"))
            .await
            .unwrap();

        let before = store.get(&id).await.unwrap().unwrap();
        for patch in [
            PredictionPatch::status(PredictionStatus::Processing),
            PredictionPatch::selected_cards(vec![1, 2, 3]),
            PredictionPatch::failed("again"),
        ] {
            let err = store.update(&id, patch).await.unwrap_err();
            assert!(matches!(err, StoreError::TerminalState(_)));
        }
        // Nothing moved.
        assert_eq!(store.get(&id).await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn latest_for_user_picks_the_newest() {
        let store = InMemoryPredictionStore::new();
        let user = UserId::new("u1").unwrap();

        let mut older = pending("first", Some("u1"));
        older.created_at = Utc::now() - Duration::seconds(300);
        let newer = pending("second", Some("u1"));
        let newer_id = newer.job_id.clone();
        let other = pending("other user", Some("u2"));

        store.create(older).await.unwrap();
        store.create(newer).await.unwrap();
        store.create(other).await.unwrap();

        let latest = store.latest_for_user(&user).await.unwrap().unwrap();
        assert_eq!(latest.job_id, newer_id);

        let nobody = UserId::new("ghost").unwrap();
        assert!(store.latest_for_user(&nobody).await.unwrap().is_none());
    }
}
