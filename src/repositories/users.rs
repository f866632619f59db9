use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::UserRepository;
use crate::{
    error::{AppError, AppResult},
    models::User,
};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            created_at: row.created_at,
            preferred_categories: Vec::new(),
        }
    }
}

/// Timestamps are cast so both `timestamp` and `timestamptz` columns decode
const SELECT_USER_BY_ID: &str = r#"
    SELECT id, email, created_at::timestamptz AS created_at
    FROM "User"
    WHERE id = $1
"#;

/// Similarity is the number of plays over the past 30 days in categories the
/// target user also listened to; at least two shared plays qualify.
const SELECT_SIMILAR_USERS: &str = r#"
    WITH user_categories AS (
        SELECT DISTINCT ac.category_id
        FROM "ListenHistory" lh
        JOIN "AudioContent" ac ON lh.audio_content_id = ac.id
        WHERE lh.user_id = $1
          AND lh.created_at > NOW() - INTERVAL '30 days'
    ),
    similar_users AS (
        SELECT u.id, u.email, u.created_at, COUNT(*) AS common_plays
        FROM "ListenHistory" lh
        JOIN "AudioContent" ac ON lh.audio_content_id = ac.id
        JOIN user_categories uc ON ac.category_id = uc.category_id
        JOIN "User" u ON lh.user_id = u.id
        WHERE lh.user_id != $1
          AND lh.created_at > NOW() - INTERVAL '30 days'
        GROUP BY u.id, u.email, u.created_at
        HAVING COUNT(*) >= 2
    )
    SELECT id, email, created_at::timestamptz AS created_at
    FROM similar_users
    ORDER BY common_plays DESC, id
    LIMIT $2
"#;

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn get_by_id(&self, user_id: i32) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(SELECT_USER_BY_ID)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(User::from))
    }

    async fn get_similar_users(&self, user_id: i32, limit: usize) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(SELECT_SIMILAR_USERS)
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn save(&self, user: &User) -> AppResult<i32> {
        if user.email.is_empty() {
            return Err(AppError::InvalidInput("User email is required".to_string()));
        }

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO "User" (email, created_at)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE SET
                created_at = EXCLUDED.created_at
            RETURNING id
            "#,
        )
        .bind(&user.email)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}
