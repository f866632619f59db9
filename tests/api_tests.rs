use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use resonance_api::{
    db::CacheKey,
    error::{AppError, AppResult},
    models::{Recommendation, RecommendationReason, User},
    repositories::{CacheStore, UserRepository},
    routes::{create_router, AppState},
    services::{BlendingEngine, RecommendationService, RecommendationStrategies},
};

/// Users 1..=100 exist; user 500 makes the store fail
struct FakeUsers;

#[async_trait]
impl UserRepository for FakeUsers {
    async fn get_by_id(&self, user_id: i32) -> AppResult<Option<User>> {
        match user_id {
            500 => Err(AppError::Database(sqlx::Error::PoolTimedOut)),
            1..=100 => Ok(Some(User {
                id: user_id,
                email: format!("user{}@example.com", user_id),
                created_at: Utc::now(),
                preferred_categories: Vec::new(),
            })),
            _ => Ok(None),
        }
    }

    async fn get_similar_users(&self, _user_id: i32, _limit: usize) -> AppResult<Vec<User>> {
        Ok(Vec::new())
    }

    async fn save(&self, user: &User) -> AppResult<i32> {
        Ok(user.id)
    }
}

/// Fixed candidates per strategy; collaborative always fails
struct FakeStrategies;

fn candidates(
    user_id: i32,
    ids: &[i32],
    score: f64,
    reason: RecommendationReason,
    limit: usize,
) -> Vec<Recommendation> {
    ids.iter()
        .take(limit)
        .map(|&id| Recommendation::new(user_id, id, score, reason))
        .collect()
}

#[async_trait]
impl RecommendationStrategies for FakeStrategies {
    async fn collaborative(&self, _user_id: i32, _limit: usize) -> AppResult<Vec<Recommendation>> {
        Err(AppError::unavailable("similarity query timed out"))
    }

    async fn content_based(&self, user_id: i32, limit: usize) -> AppResult<Vec<Recommendation>> {
        Ok(candidates(user_id, &[11, 12, 13, 14, 15], 0.27, RecommendationReason::ContentBased, limit))
    }

    async fn popularity_based(&self, user_id: i32, limit: usize) -> AppResult<Vec<Recommendation>> {
        Ok(candidates(user_id, &[21, 22], 0.8, RecommendationReason::Popular, limit))
    }

    async fn new_content(&self, user_id: i32, limit: usize) -> AppResult<Vec<Recommendation>> {
        Ok(candidates(user_id, &[31], 0.1, RecommendationReason::NewContent, limit))
    }
}

#[derive(Default)]
struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(&key.to_string()).cloned())
    }

    async fn set(&self, key: &CacheKey, value: String, _ttl: Duration) -> AppResult<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> AppResult<()> {
        self.entries.lock().unwrap().remove(&key.to_string());
        Ok(())
    }

    async fn exists(&self, key: &CacheKey) -> AppResult<bool> {
        Ok(self.entries.lock().unwrap().contains_key(&key.to_string()))
    }
}

fn create_test_server() -> (TestServer, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::default());
    let service = RecommendationService::new(
        BlendingEngine::new(Arc::new(FakeStrategies)),
        cache.clone(),
        Arc::new(FakeUsers),
    );
    let app = create_router(AppState::new(service));
    (TestServer::new(app).unwrap(), cache)
}

#[tokio::test]
async fn test_health_check() {
    let (server, _) = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_recommendations_blend_and_cache() {
    let (server, cache) = create_test_server();

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 7)
        .add_query_param("limit", 20)
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["user_id"], 7);
    assert!(body["timestamp"].as_i64().unwrap() > 0);

    // 20/3 = 6 content-based, 20/5 = 4 popular, 20/10 = 2 new; collaborative failed
    let recs = body["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 8);
    assert_eq!(recs[0]["audio_content_id"], 21);
    assert_eq!(recs[0]["reason"], "popular");
    assert_eq!(recs[7]["reason"], "new_content");

    assert!(cache.exists(&CacheKey::Recommendations(7)).await.unwrap());
}

#[tokio::test]
async fn test_repeated_requests_are_identical() {
    let (server, _) = create_test_server();

    let first: Value = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 3)
        .await
        .json();
    let second: Value = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 3)
        .await
        .json();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_small_limit_truncates() {
    let (server, _) = create_test_server();

    let body: Value = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 9)
        .add_query_param("limit", 5)
        .await
        .json();

    // 5/3 = 1 content-based, 5/5 = 1 popular, 5/10 = 0 new
    let recs = body["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["audio_content_id"], 21);
    assert_eq!(recs[1]["audio_content_id"], 11);
}

#[tokio::test]
async fn test_invalid_limit_falls_back_to_default() {
    let (server, _) = create_test_server();

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 4)
        .add_query_param("limit", "many")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["recommendations"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_missing_or_bad_user_id_is_bad_request() {
    let (server, _) = create_test_server();

    let response = server.get("/api/v1/recommendations").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", "abc")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 0)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Invalid user ID"));
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let (server, cache) = create_test_server();

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 999999)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert!(!cache
        .exists(&CacheKey::Recommendations(999999))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let (server, _) = create_test_server();

    let response = server
        .get("/api/v1/recommendations")
        .add_query_param("user_id", 500)
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (server, _) = create_test_server();

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("client-trace-1"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "client-trace-1");

    let response = server.get("/health").await;
    assert!(!response.header("x-request-id").is_empty());
}
