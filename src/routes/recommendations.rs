use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::RecommendationResponse,
    routes::AppState,
};

/// Raw query string; parsed by hand so bad values map to our own errors
#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub user_id: Option<String>,
    pub limit: Option<String>,
}

impl RecommendationQuery {
    fn user_id(&self) -> AppResult<i32> {
        let raw = self
            .user_id
            .as_deref()
            .ok_or_else(|| AppError::InvalidInput("user_id is required".to_string()))?;
        raw.trim()
            .parse()
            .map_err(|_| AppError::InvalidInput(format!("Invalid user ID: {}", raw)))
    }

    /// Unparseable limits fall back to the service default
    fn limit(&self) -> i64 {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Handler for GET /api/v1/recommendations
pub async fn recommend(
    State(state): State<AppState>,
    Query(query): Query<RecommendationQuery>,
) -> AppResult<Json<RecommendationResponse>> {
    let user_id = query.user_id()?;
    let response = state
        .recommendations
        .get_recommendations(user_id, query.limit())
        .await?;
    Ok(Json(response))
}
