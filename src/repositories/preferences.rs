use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::UserPreferenceRepository;
use crate::{
    error::{AppError, AppResult},
    models::UserPreference,
};

#[derive(sqlx::FromRow)]
struct CategoryActivityRow {
    category_id: i32,
    play_count: i32,
    completion_rate: f64,
}

/// Plays weighted by completion rate, normalised so that 100 full plays saturate at 1.0
fn preference_score(play_count: i32, completion_rate: f64) -> f64 {
    (f64::from(play_count) * completion_rate / 100.0).min(1.0)
}

const UPSERT_PREFERENCE: &str = r#"
    INSERT INTO "UserPreference" (user_id, category_id, score, updated_at)
    VALUES ($1, $2, $3, NOW())
    ON CONFLICT (user_id, category_id) DO UPDATE SET
        score = EXCLUDED.score,
        updated_at = EXCLUDED.updated_at
"#;

const DELETE_USER_PREFERENCES: &str = r#"DELETE FROM "UserPreference" WHERE user_id = $1"#;

const INSERT_PREFERENCE: &str = r#"
    INSERT INTO "UserPreference" (user_id, category_id, score, updated_at)
    VALUES ($1, $2, $3, NOW())
"#;

fn validate(preference: &UserPreference) -> AppResult<()> {
    if preference.user_id <= 0
        || preference.category_id <= 0
        || !(0.0..=1.0).contains(&preference.score)
    {
        return Err(AppError::InvalidInput(format!(
            "Invalid preference of user {} for category {} (score {})",
            preference.user_id, preference.category_id, preference.score
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PgUserPreferenceRepository {
    pool: PgPool,
}

impl PgUserPreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserPreferenceRepository for PgUserPreferenceRepository {
    /// Preferences are derived from the last 90 days of listening; a category
    /// needs at least three plays to count.
    async fn get_user_preferences(&self, user_id: i32) -> AppResult<Vec<UserPreference>> {
        let rows = sqlx::query_as::<_, CategoryActivityRow>(
            r#"
            SELECT ac.category_id,
                   COUNT(*)::int AS play_count,
                   AVG(CASE WHEN lh.completed THEN 1.0 ELSE 0.5 END)::float8 AS completion_rate
            FROM "ListenHistory" lh
            JOIN "AudioContent" ac ON lh.audio_content_id = ac.id
            WHERE lh.user_id = $1
              AND lh.created_at > NOW() - INTERVAL '90 days'
            GROUP BY ac.category_id
            HAVING COUNT(*) >= 3
            ORDER BY ac.category_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        Ok(rows
            .into_iter()
            .map(|row| UserPreference {
                user_id,
                category_id: row.category_id,
                score: preference_score(row.play_count, row.completion_rate),
                updated_at: now,
            })
            .collect())
    }

    async fn save_user_preference(&self, preference: &UserPreference) -> AppResult<()> {
        validate(preference)?;

        sqlx::query(UPSERT_PREFERENCE)
            .bind(preference.user_id)
            .bind(preference.category_id)
            .bind(preference.score)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn replace_user_preferences(
        &self,
        user_id: i32,
        preferences: &[UserPreference],
    ) -> AppResult<()> {
        // A bad batch is rejected before the existing rows are touched
        for preference in preferences {
            validate(preference)?;
            if preference.user_id != user_id {
                return Err(AppError::InvalidInput(format!(
                    "Preference of user {} cannot replace preferences of user {}",
                    preference.user_id, user_id
                )));
            }
        }

        // Dropping the transaction without commit rolls it back
        let mut tx = self.pool.begin().await?;

        sqlx::query(DELETE_USER_PREFERENCES)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for preference in preferences {
            sqlx::query(INSERT_PREFERENCE)
                .bind(user_id)
                .bind(preference.category_id)
                .bind(preference.score)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            user_id,
            count = preferences.len(),
            "Replaced user preferences"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::lazy_pool;

    #[test]
    fn test_preference_score_scales_with_plays_and_completion() {
        assert!((preference_score(40, 1.0) - 0.4).abs() < 1e-9);
        assert!((preference_score(40, 0.5) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_preference_score_is_capped() {
        assert_eq!(preference_score(500, 1.0), 1.0);
    }

    fn preference(user_id: i32, category_id: i32, score: f64) -> UserPreference {
        UserPreference {
            user_id,
            category_id,
            score,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_validate_bounds() {
        assert!(validate(&preference(1, 2, 0.0)).is_ok());
        assert!(validate(&preference(1, 2, 1.0)).is_ok());
        assert!(validate(&preference(1, 2, 1.5)).is_err());
        assert!(validate(&preference(1, 2, f64::NAN)).is_err());
        assert!(validate(&preference(0, 2, 0.5)).is_err());
        assert!(validate(&preference(1, 0, 0.5)).is_err());
    }

    #[test]
    fn test_replace_statements_are_scoped_to_one_user() {
        assert!(DELETE_USER_PREFERENCES.contains("WHERE user_id = $1"));
        assert!(!INSERT_PREFERENCE.contains("ON CONFLICT"));
        assert!(UPSERT_PREFERENCE.contains("ON CONFLICT (user_id, category_id)"));
    }

    #[tokio::test]
    async fn test_replace_rejects_foreign_or_invalid_batch_before_querying() {
        let repo = PgUserPreferenceRepository::new(lazy_pool());

        let foreign = [preference(7, 1, 0.8), preference(8, 2, 0.4)];
        assert!(matches!(
            repo.replace_user_preferences(7, &foreign).await,
            Err(AppError::InvalidInput(_))
        ));

        let out_of_range = [preference(7, 1, 2.0)];
        assert!(matches!(
            repo.replace_user_preferences(7, &out_of_range).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_save_rejects_out_of_range_score() {
        let repo = PgUserPreferenceRepository::new(lazy_pool());
        assert!(matches!(
            repo.save_user_preference(&preference(3, 4, -0.1)).await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
