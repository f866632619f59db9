use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    cached,
    db::CacheKey,
    error::{AppError, AppResult},
    models::RecommendationResponse,
    repositories::{CacheStore, UserRepository},
    services::blending::BlendingEngine,
};

pub const DEFAULT_LIMIT: usize = 20;
const RECOMMENDATION_TTL: Duration = Duration::from_secs(3600);

/// Request-facing entry point for personalized recommendations
///
/// Validates the request, confirms the user exists, then serves from the
/// cache or blends a fresh result and writes it back (cache-aside). Concurrent
/// misses for the same user each recompute; the last write wins.
#[derive(Clone)]
pub struct RecommendationService {
    engine: BlendingEngine,
    cache: Arc<dyn CacheStore>,
    users: Arc<dyn UserRepository>,
}

impl RecommendationService {
    pub fn new(
        engine: BlendingEngine,
        cache: Arc<dyn CacheStore>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            engine,
            cache,
            users,
        }
    }

    /// Returns the ranked recommendations for `user_id`.
    ///
    /// A non-positive `limit` falls back to [`DEFAULT_LIMIT`]. Cache failures are
    /// logged and never fail the request.
    pub async fn get_recommendations(
        &self,
        user_id: i32,
        limit: i64,
    ) -> AppResult<RecommendationResponse> {
        if user_id <= 0 {
            return Err(AppError::InvalidInput(format!(
                "Invalid user ID: {}",
                user_id
            )));
        }

        let limit = usize::try_from(limit)
            .ok()
            .filter(|&l| l > 0)
            .unwrap_or(DEFAULT_LIMIT);

        match self.users.get_by_id(user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(AppError::UserNotFound(user_id)),
            Err(e) => {
                tracing::error!(user_id, error = %e, "User lookup failed");
                return Err(AppError::unavailable(e));
            }
        }

        let key = CacheKey::Recommendations(user_id);
        cached!(self.cache, key, RECOMMENDATION_TTL, async {
            let set = self.engine.blend(user_id, limit).await;

            tracing::info!(
                user_id,
                limit,
                count = set.len(),
                "Computed fresh recommendations"
            );

            Ok::<_, AppError>(RecommendationResponse {
                user_id,
                recommendations: set.recommendations().to_vec(),
                timestamp: Utc::now().timestamp(),
            })
        })
    }
}
