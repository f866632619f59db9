//! Store and cache accessors.
//!
//! Every collaborator the recommendation core reads from is expressed as an
//! async trait so the engines can be driven by Postgres/Redis in production
//! and by mocks in tests. All implementations must be safe to share across
//! tasks.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::{
    db::CacheKey,
    error::AppResult,
    models::{AudioContent, PlaybackHistory, PlaybackSession, User, UserPreference},
};

pub mod audio_content;
pub mod playback;
pub mod preferences;
pub mod users;

pub use audio_content::PgAudioContentRepository;
pub use playback::PgPlaybackRepository;
pub use preferences::PgUserPreferenceRepository;
pub use users::PgUserRepository;


#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Point lookup; `Ok(None)` when no such user exists
    async fn get_by_id(&self, user_id: i32) -> AppResult<Option<User>>;

    /// Users sharing listening categories, most similar first
    async fn get_similar_users(&self, user_id: i32, limit: usize) -> AppResult<Vec<User>>;

    /// Insert or update by email, returning the user's ID
    async fn save(&self, user: &User) -> AppResult<i32>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybackRepository: Send + Sync {
    /// Most recent plays of a user, newest first
    async fn get_user_history(&self, user_id: i32, limit: usize)
        -> AppResult<Vec<PlaybackHistory>>;

    /// All plays of a user within the trailing window
    async fn get_recent_playbacks(&self, user_id: i32, days: i32)
        -> AppResult<Vec<PlaybackHistory>>;

    async fn save_playback(&self, history: &PlaybackHistory) -> AppResult<()>;

    /// Playback sessions inserted strictly after `since`, newest first
    async fn get_sessions_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<PlaybackSession>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserPreferenceRepository: Send + Sync {
    async fn get_user_preferences(&self, user_id: i32) -> AppResult<Vec<UserPreference>>;

    /// Insert or update by (user, category)
    async fn save_user_preference(&self, preference: &UserPreference) -> AppResult<()>;

    /// Atomically replaces every stored preference of a user
    async fn replace_user_preferences(
        &self,
        user_id: i32,
        preferences: &[UserPreference],
    ) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioContentRepository: Send + Sync {
    async fn get_by_id(&self, content_id: i32) -> AppResult<Option<AudioContent>>;

    async fn get_by_ids(&self, content_ids: &[i32]) -> AppResult<Vec<AudioContent>>;

    /// Recent content in the category or by the author, skipping `exclude_ids`
    async fn get_similar_content(
        &self,
        category_id: i32,
        author_id: i32,
        exclude_ids: &[i32],
        limit: usize,
    ) -> AppResult<Vec<AudioContent>>;

    /// Content created within the trailing `days`, newest first
    async fn get_new_content(&self, days: i32, limit: usize) -> AppResult<Vec<AudioContent>>;

    /// Content ordered by play count over the trailing `days`
    async fn get_popular_content(&self, days: i32, limit: usize) -> AppResult<Vec<AudioContent>>;

    /// Insert or update by ID, returning the content's ID
    async fn save(&self, content: &AudioContent) -> AppResult<i32>;
}

/// TTL-keyed blob store holding serialized results
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<String>>;

    async fn set(&self, key: &CacheKey, value: String, ttl: Duration) -> AppResult<()>;

    /// Removing a missing key succeeds
    async fn delete(&self, key: &CacheKey) -> AppResult<()>;

    async fn exists(&self, key: &CacheKey) -> AppResult<bool>;
}
