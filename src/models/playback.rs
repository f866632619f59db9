use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Plays within this many days earn the recency bonus
const RECENT_PLAY_DAYS: i64 = 7;

/// One listening session of a user on an audio item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackHistory {
    pub user_id: i32,
    pub audio_content_id: i32,
    pub played_at: DateTime<Utc>,
    /// Seconds actually listened
    pub duration: i32,
    pub completed: bool,
}

impl PlaybackHistory {
    pub fn is_valid(&self) -> bool {
        // `played_at` is non-optional, so it is always set
        self.user_id > 0 && self.audio_content_id > 0
    }

    pub fn is_recent_play(&self, days: i64) -> bool {
        self.is_recent_play_at(days, Utc::now())
    }

    fn is_recent_play_at(&self, days: i64, now: DateTime<Utc>) -> bool {
        now - self.played_at <= Duration::days(days)
    }

    /// Engagement score relative to the current time
    pub fn engagement_score(&self) -> f64 {
        self.engagement_score_at(Utc::now())
    }

    /// Engagement score with an explicit "now".
    ///
    /// Completed plays double the base score, otherwise listening past the
    /// first minute multiplies it by 1.5; plays within the last week get a
    /// further 1.2 boost.
    pub fn engagement_score_at(&self, now: DateTime<Utc>) -> f64 {
        let mut score = 1.0;

        if self.completed {
            score *= 2.0;
        } else if self.duration > 60 {
            score *= 1.5;
        }

        if self.is_recent_play_at(RECENT_PLAY_DAYS, now) {
            score *= 1.2;
        }

        score
    }
}

/// How much a user likes a category, on a 0..=1 scale
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPreference {
    pub user_id: i32,
    pub category_id: i32,
    pub score: f64,
    pub updated_at: DateTime<Utc>,
}

impl UserPreference {
    pub fn is_strong(&self) -> bool {
        self.score >= 0.7
    }

    pub fn is_weak(&self) -> bool {
        self.score < 0.3
    }
}
