//! Submission rate limiting.
//!
//! Derived entirely from the prediction store's history: the cooldown check
//! looks at the user's most recent job, so no separate counter store exists
//! to drift out of sync.

use std::sync::Arc;
use std::time::Duration;

use arcana_core::UserId;

use crate::store::{PredictionStore, StoreError};

/// Outcome of a cooldown check, as a value (limited is expected, not an error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Rejected; retry after this many seconds (always >= 1).
    Limited { retry_after_secs: u64 },
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn PredictionStore>,
    cooldown: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn PredictionStore>, cooldown: Duration) -> Self {
        Self { store, cooldown }
    }

    /// Check whether the user may submit now.
    pub async fn check(&self, user_id: &UserId) -> Result<RateLimitDecision, StoreError> {
        let Some(latest) = self.store.latest_for_user(user_id).await? else {
            return Ok(RateLimitDecision::Allowed);
        };

        let elapsed = chrono::Utc::now()
            .signed_duration_since(latest.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        if elapsed >= self.cooldown {
            return Ok(RateLimitDecision::Allowed);
        }

        let remaining = self.cooldown - elapsed;
        let retry_after_secs = remaining
            .as_secs()
            .saturating_add(u64::from(remaining.subsec_nanos() > 0))
            .max(1);
        Ok(RateLimitDecision::Limited { retry_after_secs })
    }
}
