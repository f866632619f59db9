use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::PlaybackRepository;
use crate::{
    error::{AppError, AppResult},
    models::{PlaybackHistory, PlaybackSession},
};

#[derive(sqlx::FromRow)]
struct HistoryRow {
    user_id: i32,
    audio_content_id: i32,
    played_at: DateTime<Utc>,
    duration: i32,
    completed: bool,
}

impl From<HistoryRow> for PlaybackHistory {
    fn from(row: HistoryRow) -> Self {
        PlaybackHistory {
            user_id: row.user_id,
            audio_content_id: row.audio_content_id,
            played_at: row.played_at,
            duration: row.duration,
            completed: row.completed,
        }
    }
}

/// Most recent plays first. Timestamps are cast so both `timestamp` and
/// `timestamptz` columns decode.
const SELECT_USER_HISTORY: &str = r#"
    SELECT lh.user_id, lh.audio_content_id, lh.created_at::timestamptz AS played_at,
           COALESCE(lh.duration, 0)::int AS duration,
           COALESCE(lh.completed, false) AS completed
    FROM "ListenHistory" lh
    WHERE lh.user_id = $1
    ORDER BY lh.created_at DESC
    LIMIT $2
"#;

const SELECT_RECENT_PLAYBACKS: &str = r#"
    SELECT lh.user_id, lh.audio_content_id, lh.created_at::timestamptz AS played_at,
           COALESCE(lh.duration, 0)::int AS duration,
           COALESCE(lh.completed, false) AS completed
    FROM "ListenHistory" lh
    WHERE lh.user_id = $1
      AND lh.created_at > NOW() - make_interval(days => $2)
    ORDER BY lh.created_at DESC
"#;

const SELECT_SESSIONS_SINCE: &str = r#"
    SELECT id, user_id, audio_content_id, created_at::timestamptz AS created_at
    FROM playback_sessions
    WHERE created_at > $1
    ORDER BY created_at DESC
    LIMIT $2
"#;

#[derive(Clone)]
pub struct PgPlaybackRepository {
    pool: PgPool,
}

impl PgPlaybackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlaybackRepository for PgPlaybackRepository {
    async fn get_user_history(
        &self,
        user_id: i32,
        limit: usize,
    ) -> AppResult<Vec<PlaybackHistory>> {
        let rows = sqlx::query_as::<_, HistoryRow>(SELECT_USER_HISTORY)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PlaybackHistory::from).collect())
    }

    async fn get_recent_playbacks(
        &self,
        user_id: i32,
        days: i32,
    ) -> AppResult<Vec<PlaybackHistory>> {
        let rows = sqlx::query_as::<_, HistoryRow>(SELECT_RECENT_PLAYBACKS)
            .bind(user_id)
            .bind(days)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(PlaybackHistory::from).collect())
    }

    async fn save_playback(&self, history: &PlaybackHistory) -> AppResult<()> {
        if !history.is_valid() {
            return Err(AppError::InvalidInput(format!(
                "Invalid playback for user {} and content {}",
                history.user_id, history.audio_content_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO "ListenHistory" (user_id, audio_content_id, created_at, duration, completed)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(history.user_id)
        .bind(history.audio_content_id)
        .bind(history.played_at)
        .bind(history.duration)
        .bind(history.completed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_sessions_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<PlaybackSession>> {
        let rows = sqlx::query_as::<_, PlaybackSession>(SELECT_SESSIONS_SINCE)
            .bind(since)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}
