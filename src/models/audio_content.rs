use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const NEW_CONTENT_DAYS: i64 = 7;
const RECENCY_BONUS: f64 = 10.0;

/// A publishable audio item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioContent {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category_id: i32,
    pub author_id: i32,
    /// Length in seconds
    pub duration: i32,
    pub created_at: DateTime<Utc>,
    pub play_count: i32,
    pub like_count: i32,
}

impl AudioContent {
    pub fn is_valid(&self) -> bool {
        self.id > 0 && !self.title.is_empty() && self.duration > 0
    }

    pub fn is_popular(&self) -> bool {
        self.play_count > 100 || self.like_count > 50
    }

    pub fn is_new(&self) -> bool {
        self.is_new_at(Utc::now())
    }

    fn is_new_at(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at <= Duration::days(NEW_CONTENT_DAYS)
    }

    pub fn popularity_score(&self) -> f64 {
        self.popularity_score_at(Utc::now())
    }

    /// Weighted plays and likes, plus a flat bonus for content from the past week
    pub fn popularity_score_at(&self, now: DateTime<Utc>) -> f64 {
        let play_score = f64::from(self.play_count) * 0.7;
        let like_score = f64::from(self.like_count) * 1.5;
        let recency_bonus = if self.is_new_at(now) {
            RECENCY_BONUS
        } else {
            0.0
        };

        play_score + like_score + recency_bonus
    }
}
