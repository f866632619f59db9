use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score at or above which a recommendation counts as high quality
const HIGH_QUALITY_SCORE: f64 = 3.0;

/// Which strategy surfaced a recommendation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    /// Listened to by users with overlapping taste
    SimilarUsers,
    /// Matches one of the user's strong category preferences
    ContentBased,
    /// Among the most played items of the past week
    Popular,
    /// Published in the last few days
    NewContent,
}

/// A single scored suggestion of audio content for a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub user_id: i32,
    pub audio_content_id: i32,
    pub score: f64,
    pub reason: RecommendationReason,
    pub generated_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn new(
        user_id: i32,
        audio_content_id: i32,
        score: f64,
        reason: RecommendationReason,
    ) -> Self {
        Self {
            user_id,
            audio_content_id,
            score,
            reason,
            generated_at: Utc::now(),
        }
    }

    /// Returns the same recommendation stamped with another generation time
    pub fn with_generated_at(self, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            ..self
        }
    }

    pub fn is_valid(&self) -> bool {
        self.user_id > 0 && self.audio_content_id > 0 && self.score > 0.0
    }

    pub fn is_high_quality(&self) -> bool {
        self.score >= HIGH_QUALITY_SCORE
    }
}

/// Ordered collection of recommendations built for one request.
///
/// Only valid recommendations are ever stored, so every consumer can rely on
/// positive IDs and scores.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationSet {
    pub user_id: i32,
    pub generated_at: DateTime<Utc>,
    recommendations: Vec<Recommendation>,
}

impl RecommendationSet {
    pub fn new(user_id: i32, generated_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            generated_at,
            recommendations: Vec::new(),
        }
    }

    /// Appends a recommendation, silently dropping invalid ones.
    ///
    /// Returns whether the recommendation was kept.
    pub fn add(&mut self, recommendation: Recommendation) -> bool {
        if !recommendation.is_valid() {
            return false;
        }
        self.recommendations.push(recommendation);
        true
    }

    /// Sorts by descending score; equal scores keep their insertion order
    pub fn sort_by_score(&mut self) {
        // `sort_by` is stable
        self.recommendations
            .sort_by(|a, b| b.score.total_cmp(&a.score));
    }

    /// The first `count` recommendations, or all of them if fewer
    pub fn limit(&self, count: usize) -> &[Recommendation] {
        let end = count.min(self.recommendations.len());
        &self.recommendations[..end]
    }

    pub fn filter_high_quality(&self) -> Vec<&Recommendation> {
        self.recommendations
            .iter()
            .filter(|r| r.is_high_quality())
            .collect()
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn len(&self) -> usize {
        self.recommendations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }
}
