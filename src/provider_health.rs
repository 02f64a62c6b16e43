//! Model health tracking.
//!
//! A time-bounded unavailability registry that acts as a simple circuit
//! breaker: a model that just failed is excluded from selection until its
//! cooldown expires. Expiry is lazy, an expired entry is removed by the
//! lookup that discovers it.
//!
//! The registry is meant to outlive a single finder invocation. Clones share
//! the same map, so hand a clone to every finder in a process.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::agents::ModelCandidate;

/// Cooldown applied after a quota or rate-limit failure.
pub const QUOTA_COOLDOWN_MINUTES: i64 = 30;
/// Cooldown applied after any other failure.
pub const ERROR_COOLDOWN_MINUTES: i64 = 10;

/// Reason a model was placed into cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownReason {
    /// Quota exhausted or rate limited
    Quota,
    /// Any other failure
    Error,
}

impl CooldownReason {
    pub fn ttl(&self) -> Duration {
        match self {
            Self::Quota => Duration::minutes(QUOTA_COOLDOWN_MINUTES),
            Self::Error => Duration::minutes(ERROR_COOLDOWN_MINUTES),
        }
    }
}

impl std::fmt::Display for CooldownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quota => write!(f, "quota"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One cooldown entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnavailableEntry {
    pub expires_at: DateTime<Utc>,
    pub reason: CooldownReason,
}

/// Process-wide cooldown map keyed by normalized `provider/model`.
///
/// At most one entry exists per key; marking again replaces the old entry.
#[derive(Debug, Clone, Default)]
pub struct UnavailabilityRegistry {
    entries: Arc<RwLock<HashMap<String, UnavailableEntry>>>,
}

impl UnavailabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `model` into cooldown starting now.
    pub async fn mark(&self, model: &ModelCandidate, reason: CooldownReason) -> DateTime<Utc> {
        self.mark_at(model, reason, Utc::now()).await
    }

    /// Place `model` into cooldown starting at `now`. Returns the expiry.
    pub async fn mark_at(
        &self,
        model: &ModelCandidate,
        reason: CooldownReason,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let expires_at = now + reason.ttl();
        self.entries
            .write()
            .await
            .insert(model.key(), UnavailableEntry { expires_at, reason });

        tracing::info!(
            model = %model,
            reason = %reason,
            expires_at = %expires_at,
            "Model placed in cooldown"
        );
        expires_at
    }

    /// Whether `model` is currently in cooldown.
    pub async fn is_unavailable(&self, model: &ModelCandidate) -> bool {
        self.is_unavailable_at(model, Utc::now()).await
    }

    /// Whether `model` is in cooldown at `now`. Drops the entry if it has expired.
    pub async fn is_unavailable_at(&self, model: &ModelCandidate, now: DateTime<Utc>) -> bool {
        let key = model.key();
        let expired = match self.entries.read().await.get(&key) {
            None => return false,
            Some(entry) => entry.expires_at <= now,
        };
        if !expired {
            return true;
        }

        let mut entries = self.entries.write().await;
        // Re-check under the write lock: a concurrent mark may have replaced it.
        match entries.get(&key) {
            Some(entry) if entry.expires_at <= now => {
                entries.remove(&key);
                tracing::debug!(model = %model, "Cooldown expired");
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Current entry for `model`, without expiring it.
    pub async fn entry(&self, model: &ModelCandidate) -> Option<UnavailableEntry> {
        self.entries.read().await.get(&model.key()).copied()
    }

    /// Number of stored entries, including ones that expired but were not looked up yet.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelCandidate {
        ModelCandidate::new("acme", "x")
    }

    #[tokio::test]
    async fn unknown_models_are_available() {
        let registry = UnavailabilityRegistry::new();
        assert!(!registry.is_unavailable(&model()).await);
    }

    #[tokio::test]
    async fn quota_entry_expires_after_thirty_minutes() {
        let registry = UnavailabilityRegistry::new();
        let marked = Utc::now();
        let expires = registry.mark_at(&model(), CooldownReason::Quota, marked).await;
        assert_eq!(expires, marked + Duration::minutes(30));

        let just_before = expires - Duration::milliseconds(1);
        assert!(registry.is_unavailable_at(&model(), just_before).await);
        assert_eq!(registry.len().await, 1);

        let just_after = expires + Duration::milliseconds(1);
        assert!(!registry.is_unavailable_at(&model(), just_after).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn error_entry_expires_after_ten_minutes() {
        let registry = UnavailabilityRegistry::new();
        let marked = Utc::now();
        registry.mark_at(&model(), CooldownReason::Error, marked).await;

        assert!(
            registry
                .is_unavailable_at(&model(), marked + Duration::minutes(10) - Duration::milliseconds(1))
                .await
        );
        assert!(
            !registry
                .is_unavailable_at(&model(), marked + Duration::minutes(10))
                .await
        );
    }

    #[tokio::test]
    async fn marking_again_replaces_entry() {
        let registry = UnavailabilityRegistry::new();
        let marked = Utc::now();
        registry.mark_at(&model(), CooldownReason::Quota, marked).await;
        registry
            .mark_at(&ModelCandidate::new("ACME", "X"), CooldownReason::Error, marked)
            .await;

        assert_eq!(registry.len().await, 1);
        let entry = registry.entry(&model()).await.unwrap();
        assert_eq!(entry.reason, CooldownReason::Error);
        assert_eq!(entry.expires_at, marked + Duration::minutes(10));
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let registry = UnavailabilityRegistry::new();
        registry.mark(&ModelCandidate::new("Acme", "X"), CooldownReason::Quota).await;
        assert!(registry.is_unavailable(&model()).await);
    }

    #[tokio::test]
    async fn instances_are_independent_and_clones_share_state() {
        let a = UnavailabilityRegistry::new();
        let b = UnavailabilityRegistry::new();
        let shared = a.clone();
        a.mark(&model(), CooldownReason::Error).await;

        assert!(shared.is_unavailable(&model()).await);
        assert!(!b.is_unavailable(&model()).await);
    }
}
