//! The four independent recommendation strategies.
//!
//! Each strategy reads only from the store accessors and the scoring methods
//! on the models, and returns candidates in no particular order; the blending
//! engine re-sorts everything it receives.
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Recommendation, RecommendationReason},
    repositories::{
        AudioContentRepository, PlaybackRepository, UserPreferenceRepository, UserRepository,
    },
};

const SIMILAR_USER_LIMIT: usize = 10;
const OWN_HISTORY_LIMIT: usize = 100;
const SIMILAR_USER_HISTORY_LIMIT: usize = 20;
const COLLABORATIVE_MIN_SCORE: f64 = 2.0;
const COLLABORATIVE_WEIGHT: f64 = 0.4;

const CONTENT_BASED_HISTORY_LIMIT: usize = 50;
const ITEMS_PER_PREFERENCE: usize = 5;
const CONTENT_BASED_WEIGHT: f64 = 0.3;

const POPULAR_WINDOW_DAYS: i32 = 7;
const POPULAR_OVERFETCH: usize = 10;
const POPULARITY_WEIGHT: f64 = 0.2;

const NEW_CONTENT_WINDOW_DAYS: i32 = 3;
const NEW_CONTENT_SCORE: f64 = 0.1;

/// Source of candidate recommendations, one method per strategy
///
/// A strategy that receives `limit == 0` returns no candidates. Store failures
/// surface as errors; the caller decides whether they are fatal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecommendationStrategies: Send + Sync {
    async fn collaborative(&self, user_id: i32, limit: usize) -> AppResult<Vec<Recommendation>>;

    async fn content_based(&self, user_id: i32, limit: usize) -> AppResult<Vec<Recommendation>>;

    async fn popularity_based(&self, user_id: i32, limit: usize)
        -> AppResult<Vec<Recommendation>>;

    async fn new_content(&self, user_id: i32, limit: usize) -> AppResult<Vec<Recommendation>>;
}

/// Strategies computed from the relational store
#[derive(Clone)]
pub struct StoreBackedStrategies {
    users: Arc<dyn UserRepository>,
    playback: Arc<dyn PlaybackRepository>,
    preferences: Arc<dyn UserPreferenceRepository>,
    content: Arc<dyn AudioContentRepository>,
}

impl StoreBackedStrategies {
    pub fn new(
        users: Arc<dyn UserRepository>,
        playback: Arc<dyn PlaybackRepository>,
        preferences: Arc<dyn UserPreferenceRepository>,
        content: Arc<dyn AudioContentRepository>,
    ) -> Self {
        Self {
            users,
            playback,
            preferences,
            content,
        }
    }

    async fn watched_content(&self, user_id: i32, limit: usize) -> AppResult<HashSet<i32>> {
        let history = self.playback.get_user_history(user_id, limit).await?;
        Ok(history.iter().map(|h| h.audio_content_id).collect())
    }
}

#[async_trait]
impl RecommendationStrategies for StoreBackedStrategies {
    /// Sums the engagement of similar users' recent plays per unseen item.
    ///
    /// Items reaching the minimum total are emitted best first (ties by
    /// content ID) so the `limit` cut keeps the strongest candidates.
    async fn collaborative(&self, user_id: i32, limit: usize) -> AppResult<Vec<Recommendation>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let similar_users = self
            .users
            .get_similar_users(user_id, SIMILAR_USER_LIMIT)
            .await?;
        if similar_users.is_empty() {
            return Ok(Vec::new());
        }

        let watched = self.watched_content(user_id, OWN_HISTORY_LIMIT).await?;

        let mut content_scores: HashMap<i32, f64> = HashMap::new();
        for similar in &similar_users {
            let history = match self
                .playback
                .get_user_history(similar.id, SIMILAR_USER_HISTORY_LIMIT)
                .await
            {
                Ok(history) => history,
                Err(e) => {
                    tracing::debug!(
                        similar_user_id = similar.id,
                        error = %e,
                        "Skipping similar user without readable history"
                    );
                    continue;
                }
            };

            for playback in history {
                if watched.contains(&playback.audio_content_id) {
                    continue;
                }
                *content_scores.entry(playback.audio_content_id).or_insert(0.0) +=
                    playback.engagement_score();
            }
        }

        let mut qualifying: Vec<(i32, f64)> = content_scores
            .into_iter()
            .filter(|&(_, score)| score >= COLLABORATIVE_MIN_SCORE)
            .collect();
        qualifying.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        Ok(qualifying
            .into_iter()
            .take(limit)
            .map(|(content_id, score)| {
                Recommendation::new(
                    user_id,
                    content_id,
                    score * COLLABORATIVE_WEIGHT,
                    RecommendationReason::SimilarUsers,
                )
            })
            .collect())
    }

    /// Up to five unseen items per strong category preference.
    ///
    /// `limit` only gates the zero case; the per-preference cap bounds the output.
    async fn content_based(&self, user_id: i32, limit: usize) -> AppResult<Vec<Recommendation>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let preferences = self.preferences.get_user_preferences(user_id).await?;
        if preferences.is_empty() {
            return Ok(Vec::new());
        }

        let exclude_ids: Vec<i32> = self
            .playback
            .get_user_history(user_id, CONTENT_BASED_HISTORY_LIMIT)
            .await?
            .iter()
            .map(|h| h.audio_content_id)
            .collect();

        let mut recommendations = Vec::new();
        for preference in preferences.iter().filter(|p| p.is_strong()) {
            let similar = match self
                .content
                .get_similar_content(preference.category_id, 0, &exclude_ids, ITEMS_PER_PREFERENCE)
                .await
            {
                Ok(similar) => similar,
                Err(e) => {
                    tracing::debug!(
                        category_id = preference.category_id,
                        error = %e,
                        "Skipping category without readable content"
                    );
                    continue;
                }
            };

            recommendations.extend(similar.into_iter().map(|content| {
                Recommendation::new(
                    user_id,
                    content.id,
                    preference.score * CONTENT_BASED_WEIGHT,
                    RecommendationReason::ContentBased,
                )
            }));
        }

        Ok(recommendations)
    }

    /// Scores the week's most played items by rank, skipping ones the user heard.
    ///
    /// Rank counts skipped items too, so a heavily filtered list can produce
    /// non-positive scores; those are dropped when blended.
    async fn popularity_based(
        &self,
        user_id: i32,
        limit: usize,
    ) -> AppResult<Vec<Recommendation>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let popular = self
            .content
            .get_popular_content(POPULAR_WINDOW_DAYS, limit + POPULAR_OVERFETCH)
            .await?;
        let watched = self.watched_content(user_id, OWN_HISTORY_LIMIT).await?;

        let mut recommendations = Vec::new();
        for (rank, content) in popular.iter().enumerate() {
            if watched.contains(&content.id) {
                continue;
            }

            let score = (limit as f64 - rank as f64) * POPULARITY_WEIGHT;
            recommendations.push(Recommendation::new(
                user_id,
                content.id,
                score,
                RecommendationReason::Popular,
            ));

            if recommendations.len() >= limit {
                break;
            }
        }

        Ok(recommendations)
    }

    async fn new_content(&self, user_id: i32, limit: usize) -> AppResult<Vec<Recommendation>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let fresh = self
            .content
            .get_new_content(NEW_CONTENT_WINDOW_DAYS, limit)
            .await?;

        Ok(fresh
            .into_iter()
            .map(|content| {
                Recommendation::new(
                    user_id,
                    content.id,
                    NEW_CONTENT_SCORE,
                    RecommendationReason::NewContent,
                )
            })
            .collect())
    }
}
