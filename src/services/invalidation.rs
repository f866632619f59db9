use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::{
    db::CacheKey,
    models::{ChangeEvent, PLAYBACK_SESSIONS_TABLE, USER_RATINGS_TABLE},
    repositories::CacheStore,
    services::dispatcher::{EventDispatcher, EventHandler},
};

/// Drops a user's cached recommendations when their listening data changes.
///
/// Events that do not identify a user are ignored. Deleting an absent entry is
/// a no-op, so duplicate events from the push and poll paths are harmless.
pub struct CacheInvalidator {
    cache: Arc<dyn CacheStore>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Subscribes this invalidator to every table that affects recommendations
    pub fn register(self: &Arc<Self>, dispatcher: &mut EventDispatcher) {
        for table in [PLAYBACK_SESSIONS_TABLE, USER_RATINGS_TABLE] {
            dispatcher.register_handler(table, Arc::clone(self) as Arc<dyn EventHandler>);
        }
    }

    /// Finds the affected user in an event payload.
    ///
    /// Looks for a top-level `user_id` (integer, float or numeric string). Push
    /// events carry the notification text under `payload`; when that text is a
    /// JSON object its `user_id` is used.
    pub fn extract_user_id(payload: &Map<String, Value>) -> Option<i32> {
        if let Some(id) = payload.get("user_id").and_then(user_id_from_value) {
            return Some(id);
        }

        let raw = payload.get("payload")?.as_str()?;
        let inner: Map<String, Value> = serde_json::from_str(raw).ok()?;
        inner.get("user_id").and_then(user_id_from_value)
    }

    pub async fn invalidate_user(&self, user_id: i32) {
        let key = CacheKey::Recommendations(user_id);
        match self.cache.delete(&key).await {
            Ok(()) => tracing::info!(user_id, "Invalidated cached recommendations"),
            Err(e) => tracing::warn!(user_id, error = %e, "Failed to invalidate cached recommendations"),
        }
    }

    /// Hook for invalidating users whose recommendations depend on `user_id`.
    /// Similar-user fan-out is not tracked, so nothing else is dropped yet.
    pub async fn invalidate_related_users(&self, user_id: i32) {
        tracing::trace!(user_id, "No related-user invalidation configured");
    }
}

fn user_id_from_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(|id| i32::try_from(id).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl EventHandler for CacheInvalidator {
    async fn handle(&self, event: &ChangeEvent) {
        let Some(user_id) = Self::extract_user_id(&event.payload) else {
            tracing::debug!(table = %event.table_name, "Change event without user, skipping");
            return;
        };

        self.invalidate_user(user_id).await;
        self.invalidate_related_users(user_id).await;
    }

    fn name(&self) -> &'static str {
        "cache_invalidator"
    }
}
