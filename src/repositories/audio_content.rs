use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::AudioContentRepository;
use crate::{
    error::{AppError, AppResult},
    models::AudioContent,
};

#[derive(sqlx::FromRow)]
struct AudioContentRow {
    id: i32,
    title: String,
    description: Option<String>,
    category_id: i32,
    author_id: i32,
    duration: i32,
    created_at: DateTime<Utc>,
    play_count: i32,
    like_count: i32,
}

impl From<AudioContentRow> for AudioContent {
    fn from(row: AudioContentRow) -> Self {
        AudioContent {
            id: row.id,
            title: row.title,
            description: row.description.unwrap_or_default(),
            category_id: row.category_id,
            author_id: row.author_id,
            duration: row.duration,
            created_at: row.created_at,
            play_count: row.play_count,
            like_count: row.like_count,
        }
    }
}

/// Content columns with lifetime play and like counts joined in
const SELECT_WITH_COUNTS: &str = r#"
    SELECT ac.id, ac.title, ac.description, ac.category_id, ac.author_id,
           COALESCE(ac.duration, 0)::int AS duration,
           ac.created_at::timestamptz AS created_at,
           COALESCE(plays.count, 0)::int AS play_count,
           COALESCE(likes.count, 0)::int AS like_count
    FROM "AudioContent" ac
    LEFT JOIN (
        SELECT audio_content_id, COUNT(*) AS count
        FROM "ListenHistory"
        GROUP BY audio_content_id
    ) plays ON ac.id = plays.audio_content_id
    LEFT JOIN (
        SELECT content_id, COUNT(*) AS count
        FROM "Like"
        GROUP BY content_id
    ) likes ON ac.id = likes.content_id
"#;

/// Recent content in a category or by an author, newest first
const SELECT_SIMILAR_CONTENT: &str = r#"
    SELECT id, title, description, category_id, author_id,
           COALESCE(duration, 0)::int AS duration,
           created_at::timestamptz AS created_at,
           0 AS play_count, 0 AS like_count
    FROM "AudioContent"
    WHERE (category_id = $1 OR author_id = $2)
      AND id != ALL($3)
      AND created_at > NOW() - INTERVAL '180 days'
    ORDER BY created_at DESC
    LIMIT $4
"#;

const SELECT_NEW_CONTENT: &str = r#"
    SELECT id, title, description, category_id, author_id,
           COALESCE(duration, 0)::int AS duration,
           created_at::timestamptz AS created_at,
           0 AS play_count, 0 AS like_count
    FROM "AudioContent"
    WHERE created_at > NOW() - make_interval(days => $1)
    ORDER BY created_at DESC
    LIMIT $2
"#;

/// Play counts only cover the trailing window
const SELECT_POPULAR_CONTENT: &str = r#"
    SELECT ac.id, ac.title, ac.description, ac.category_id, ac.author_id,
           COALESCE(ac.duration, 0)::int AS duration,
           ac.created_at::timestamptz AS created_at,
           COUNT(*)::int AS play_count, 0 AS like_count
    FROM "ListenHistory" lh
    JOIN "AudioContent" ac ON lh.audio_content_id = ac.id
    WHERE lh.created_at > NOW() - make_interval(days => $1)
    GROUP BY ac.id, ac.title, ac.description, ac.category_id, ac.author_id,
             ac.duration, ac.created_at
    ORDER BY play_count DESC, ac.created_at DESC
    LIMIT $2
"#;

#[derive(Clone)]
pub struct PgAudioContentRepository {
    pool: PgPool,
}

impl PgAudioContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AudioContentRepository for PgAudioContentRepository {
    async fn get_by_id(&self, content_id: i32) -> AppResult<Option<AudioContent>> {
        let query = format!("{} WHERE ac.id = $1", SELECT_WITH_COUNTS);
        let row = sqlx::query_as::<_, AudioContentRow>(&query)
            .bind(content_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(AudioContent::from))
    }

    async fn get_by_ids(&self, content_ids: &[i32]) -> AppResult<Vec<AudioContent>> {
        if content_ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!("{} WHERE ac.id = ANY($1)", SELECT_WITH_COUNTS);
        let rows = sqlx::query_as::<_, AudioContentRow>(&query)
            .bind(content_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(AudioContent::from).collect())
    }

    async fn get_similar_content(
        &self,
        category_id: i32,
        author_id: i32,
        exclude_ids: &[i32],
        limit: usize,
    ) -> AppResult<Vec<AudioContent>> {
        let rows = sqlx::query_as::<_, AudioContentRow>(SELECT_SIMILAR_CONTENT)
            .bind(category_id)
            .bind(author_id)
            .bind(exclude_ids)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(AudioContent::from).collect())
    }

    async fn get_new_content(&self, days: i32, limit: usize) -> AppResult<Vec<AudioContent>> {
        let rows = sqlx::query_as::<_, AudioContentRow>(SELECT_NEW_CONTENT)
            .bind(days)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(AudioContent::from).collect())
    }

    async fn get_popular_content(&self, days: i32, limit: usize) -> AppResult<Vec<AudioContent>> {
        let rows = sqlx::query_as::<_, AudioContentRow>(SELECT_POPULAR_CONTENT)
            .bind(days)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(AudioContent::from).collect())
    }

    async fn save(&self, content: &AudioContent) -> AppResult<i32> {
        if content.title.is_empty() || content.duration <= 0 {
            return Err(AppError::InvalidInput(
                "Audio content requires a title and a positive duration".to_string(),
            ));
        }

        if content.id > 0 {
            let id = sqlx::query_scalar::<_, i32>(
                r#"
                INSERT INTO "AudioContent"
                    (id, title, description, category_id, author_id, duration, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
                ON CONFLICT (id) DO UPDATE SET
                    title = EXCLUDED.title,
                    description = EXCLUDED.description,
                    updated_at = EXCLUDED.updated_at
                RETURNING id
                "#,
            )
            .bind(content.id)
            .bind(&content.title)
            .bind(&content.description)
            .bind(content.category_id)
            .bind(content.author_id)
            .bind(content.duration)
            .bind(content.created_at)
            .fetch_one(&self.pool)
            .await?;

            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO "AudioContent"
                (title, description, category_id, author_id, duration, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id
            "#,
        )
        .bind(&content.title)
        .bind(&content.description)
        .bind(content.category_id)
        .bind(content.author_id)
        .bind(content.duration)
        .bind(content.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}
