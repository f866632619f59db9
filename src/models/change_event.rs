use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Table whose inserts are scanned by the polling path
pub const PLAYBACK_SESSIONS_TABLE: &str = "playback_sessions";
pub const USER_RATINGS_TABLE: &str = "user_ratings";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEventType {
    /// Pushed by a store notification
    Change,
    /// Found by the polling scan
    Insert,
}

/// Notification that a row in a monitored table changed.
///
/// The same underlying change may arrive more than once (once per detection
/// path), so consumers must treat events idempotently.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChangeEvent {
    pub table_name: String,
    pub event_type: ChangeEventType,
    pub payload: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Event built from a raw push notification; the text is kept verbatim under `payload`
    pub fn from_notification(table_name: &str, raw: &str) -> Self {
        let mut payload = Map::new();
        payload.insert("payload".to_string(), Value::String(raw.to_string()));

        Self {
            table_name: table_name.to_string(),
            event_type: ChangeEventType::Change,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// A `playback_sessions` row seen by the polling scan
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PlaybackSession {
    pub id: i32,
    pub user_id: i32,
    pub audio_content_id: i32,
    pub created_at: DateTime<Utc>,
}

impl From<PlaybackSession> for ChangeEvent {
    fn from(session: PlaybackSession) -> Self {
        let mut payload = Map::new();
        payload.insert("id".to_string(), Value::from(session.id));
        payload.insert("user_id".to_string(), Value::from(session.user_id));
        payload.insert(
            "audio_content_id".to_string(),
            Value::from(session.audio_content_id),
        );
        payload.insert(
            "created_at".to_string(),
            Value::String(session.created_at.to_rfc3339()),
        );

        ChangeEvent {
            table_name: PLAYBACK_SESSIONS_TABLE.to_string(),
            event_type: ChangeEventType::Insert,
            payload,
            timestamp: session.created_at,
        }
    }
}
