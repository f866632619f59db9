use chrono::Utc;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{Recommendation, RecommendationSet},
    services::strategies::RecommendationStrategies,
};

/// Merges the four strategies into one ranked, size-bounded set
///
/// Sub-limits are fixed fractions of the requested total (1/2 collaborative,
/// 1/3 content-based, 1/5 popularity, 1/10 new content, integer division).
/// An item surfaced by several strategies appears once per strategy.
#[derive(Clone)]
pub struct BlendingEngine {
    strategies: Arc<dyn RecommendationStrategies>,
}

impl BlendingEngine {
    pub fn new(strategies: Arc<dyn RecommendationStrategies>) -> Self {
        Self { strategies }
    }

    /// Runs every strategy concurrently and keeps the best `total_limit` results.
    ///
    /// A failing strategy is logged and contributes nothing; the blend itself
    /// never fails.
    pub async fn blend(&self, user_id: i32, total_limit: usize) -> RecommendationSet {
        let (collaborative, content_based, popular, fresh) = tokio::join!(
            self.strategies.collaborative(user_id, total_limit / 2),
            self.strategies.content_based(user_id, total_limit / 3),
            self.strategies.popularity_based(user_id, total_limit / 5),
            self.strategies.new_content(user_id, total_limit / 10),
        );

        let generated_at = Utc::now();
        let mut set = RecommendationSet::new(user_id, generated_at);
        let mut dropped = 0;

        for (strategy, outcome) in [
            ("collaborative", collaborative),
            ("content_based", content_based),
            ("popularity_based", popular),
            ("new_content", fresh),
        ] {
            for rec in Self::accept(user_id, strategy, outcome) {
                if !set.add(rec.with_generated_at(generated_at)) {
                    dropped += 1;
                }
            }
        }

        set.sort_by_score();

        tracing::debug!(
            user_id,
            candidates = set.len(),
            dropped_invalid = dropped,
            total_limit,
            "Blended strategy outputs"
        );

        let mut limited = RecommendationSet::new(user_id, generated_at);
        for rec in set.limit(total_limit) {
            limited.add(rec.clone());
        }
        limited
    }

    /// Unwraps a strategy outcome, downgrading failures to an empty contribution
    fn accept(
        user_id: i32,
        strategy: &'static str,
        outcome: AppResult<Vec<Recommendation>>,
    ) -> Vec<Recommendation> {
        match outcome {
            Ok(recs) => recs,
            Err(source) => {
                let degraded = AppError::DegradedStrategy {
                    strategy,
                    source: Box::new(source),
                };
                tracing::warn!(user_id, error = %degraded, "Strategy failed, blending without it");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecommendationReason;
    use crate::services::strategies::MockRecommendationStrategies;
    use mockall::predicate::eq;

    fn rec(content_id: i32, score: f64, reason: RecommendationReason) -> Recommendation {
        Recommendation::new(1, content_id, score, reason)
    }

    fn empty_except_collaborative(
        collaborative: Vec<Recommendation>,
    ) -> MockRecommendationStrategies {
        let mut strategies = MockRecommendationStrategies::new();
        strategies
            .expect_collaborative()
            .returning(move |_, _| Ok(collaborative.clone()));
        strategies.expect_content_based().returning(|_, _| Ok(Vec::new()));
        strategies.expect_popularity_based().returning(|_, _| Ok(Vec::new()));
        strategies.expect_new_content().returning(|_, _| Ok(Vec::new()));
        strategies
    }

    #[tokio::test]
    async fn test_sub_limits_use_integer_division() {
        let mut strategies = MockRecommendationStrategies::new();
        strategies
            .expect_collaborative()
            .with(eq(1), eq(10))
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        strategies
            .expect_content_based()
            .with(eq(1), eq(6))
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        strategies
            .expect_popularity_based()
            .with(eq(1), eq(4))
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        strategies
            .expect_new_content()
            .with(eq(1), eq(2))
            .times(1)
            .returning(|_, _| Ok(Vec::new()));

        let set = BlendingEngine::new(Arc::new(strategies)).blend(1, 20).await;
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_small_total_gives_zero_sub_limits() {
        let mut strategies = MockRecommendationStrategies::new();
        strategies
            .expect_collaborative()
            .with(eq(1), eq(1))
            .returning(|_, _| Ok(Vec::new()));
        strategies
            .expect_content_based()
            .with(eq(1), eq(1))
            .returning(|_, _| Ok(Vec::new()));
        strategies
            .expect_popularity_based()
            .with(eq(1), eq(0))
            .returning(|_, _| Ok(Vec::new()));
        strategies
            .expect_new_content()
            .with(eq(1), eq(0))
            .returning(|_, _| Ok(Vec::new()));

        BlendingEngine::new(Arc::new(strategies)).blend(1, 3).await;
    }

    #[tokio::test]
    async fn test_merges_sorts_and_limits() {
        let mut strategies = MockRecommendationStrategies::new();
        strategies.expect_collaborative().returning(|_, _| {
            Ok(vec![
                rec(1, 1.6, RecommendationReason::SimilarUsers),
                rec(2, 0.8, RecommendationReason::SimilarUsers),
            ])
        });
        strategies
            .expect_content_based()
            .returning(|_, _| Ok(vec![rec(3, 0.27, RecommendationReason::ContentBased)]));
        strategies
            .expect_popularity_based()
            .returning(|_, _| Ok(vec![rec(4, 0.8, RecommendationReason::Popular)]));
        strategies
            .expect_new_content()
            .returning(|_, _| Ok(vec![rec(5, 0.1, RecommendationReason::NewContent)]));

        let set = BlendingEngine::new(Arc::new(strategies)).blend(1, 4).await;

        let ids: Vec<i32> = set
            .recommendations()
            .iter()
            .map(|r| r.audio_content_id)
            .collect();
        // Equal scores keep strategy order: collaborative before popularity
        assert_eq!(ids, vec![1, 2, 4, 3]);
        assert!(set
            .recommendations()
            .iter()
            .all(|r| r.generated_at == set.generated_at));
    }

    #[tokio::test]
    async fn test_failing_strategy_degrades_instead_of_failing() {
        let mut strategies = MockRecommendationStrategies::new();
        strategies
            .expect_collaborative()
            .returning(|_, _| Err(AppError::unavailable("similarity query timed out")));
        strategies
            .expect_content_based()
            .returning(|_, _| Ok(vec![rec(3, 0.27, RecommendationReason::ContentBased)]));
        strategies
            .expect_popularity_based()
            .returning(|_, _| Err(AppError::unavailable("timeout")));
        strategies
            .expect_new_content()
            .returning(|_, _| Ok(vec![rec(5, 0.1, RecommendationReason::NewContent)]));

        let set = BlendingEngine::new(Arc::new(strategies)).blend(1, 20).await;
        assert_eq!(set.len(), 2);
        assert_eq!(set.recommendations()[0].audio_content_id, 3);
    }

    #[tokio::test]
    async fn test_invalid_candidates_are_dropped() {
        let strategies = empty_except_collaborative(vec![
            rec(1, 0.0, RecommendationReason::SimilarUsers),
            rec(0, 2.0, RecommendationReason::SimilarUsers),
            rec(2, -0.4, RecommendationReason::SimilarUsers),
            rec(3, 0.4, RecommendationReason::SimilarUsers),
        ]);

        let set = BlendingEngine::new(Arc::new(strategies)).blend(1, 20).await;
        assert_eq!(set.len(), 1);
        assert!(set.recommendations().iter().all(|r| r.is_valid()));
    }

    #[tokio::test]
    async fn test_duplicates_across_strategies_are_kept() {
        let mut strategies = MockRecommendationStrategies::new();
        strategies
            .expect_collaborative()
            .returning(|_, _| Ok(vec![rec(7, 1.2, RecommendationReason::SimilarUsers)]));
        strategies
            .expect_content_based()
            .returning(|_, _| Ok(vec![rec(7, 0.27, RecommendationReason::ContentBased)]));
        strategies.expect_popularity_based().returning(|_, _| Ok(Vec::new()));
        strategies.expect_new_content().returning(|_, _| Ok(Vec::new()));

        let set = BlendingEngine::new(Arc::new(strategies)).blend(1, 20).await;
        assert_eq!(set.len(), 2);
        assert!(set.recommendations().iter().all(|r| r.audio_content_id == 7));
    }
}
