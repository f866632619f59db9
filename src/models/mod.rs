pub mod audio_content;
pub mod change_event;
pub mod playback;
pub mod recommendation;
pub mod user;

pub use audio_content::AudioContent;
pub use change_event::{
    ChangeEvent, ChangeEventType, PlaybackSession, PLAYBACK_SESSIONS_TABLE, USER_RATINGS_TABLE,
};
pub use playback::{PlaybackHistory, UserPreference};
pub use recommendation::{Recommendation, RecommendationReason, RecommendationSet};
pub use user::User;

use serde::{Deserialize, Serialize};

/// Result of a recommendation request, as stored in and served from the cache
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResponse {
    pub user_id: i32,
    pub recommendations: Vec<Recommendation>,
    /// Unix seconds at which the result was computed
    pub timestamp: i64,
}
