use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Quiz, QuizLevel, QuizProgress, QuizResult, QuizType, WrongAnswer};

pub mod analytics;
pub mod cache;
pub mod memory;

pub use analytics::{
    AnalyticsQueries, InMemoryAnalytics, ProgressAnalytics, QuizStatistics, StatisticsSink,
    UserPerformance, UserStatistics,
};
pub use cache::{Cache, MemoryCache};
pub use memory::InMemoryQuizRepository;

/// Conjunctive search filter; pagination is applied after filtering.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub level: Option<QuizLevel>,
    pub quiz_type: Option<QuizType>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub keyword: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Data-access surface consumed by the session engine. Missing entities
/// resolve to `None`/empty collections; only infrastructure failures (I/O,
/// decode) surface as errors.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn get_quiz_by_id(&self, id: &str) -> Result<Option<Quiz>>;

    async fn get_quizzes_by_level(&self, level: QuizLevel) -> Result<Vec<Quiz>>;

    async fn get_quizzes_by_type(&self, quiz_type: QuizType) -> Result<Vec<Quiz>>;

    /// Uniformly samples one quiz from the level's pool minus `exclude_ids`.
    /// `None` only when the remaining pool is empty.
    async fn get_random_quiz(
        &self,
        level: QuizLevel,
        exclude_ids: &[String],
    ) -> Result<Option<Quiz>>;

    async fn search_quizzes(&self, query: &SearchQuery) -> Result<Vec<Quiz>>;

    /// Persists one result and folds it into the `(user, level)` progress
    /// aggregate.
    async fn save_quiz_result(&self, result: &QuizResult) -> Result<()>;

    async fn get_quiz_results(
        &self,
        user_id: &str,
        quiz_id: Option<&str>,
    ) -> Result<Vec<QuizResult>>;

    async fn get_quiz_progress(&self, user_id: &str) -> Result<Vec<QuizProgress>>;

    /// Upsert keyed by `(user_id, level)`.
    async fn update_quiz_progress(&self, progress: &QuizProgress) -> Result<()>;

    async fn get_wrong_answers(&self, user_id: &str) -> Result<Vec<WrongAnswer>>;

    async fn add_to_wrong_answers(&self, user_id: &str, quiz_id: &str) -> Result<()>;

    async fn remove_from_wrong_answers(&self, user_id: &str, quiz_id: &str) -> Result<()>;

    /// Resolves the wrong-answer ledger back into full quiz entities.
    async fn get_review_quizzes(&self, user_id: &str) -> Result<Vec<Quiz>>;

    /// Review selection reordered by a recency/interval heuristic:
    /// most-missed first, then oldest entry first. The scheduling policy is
    /// an extension point; a Leitner/SM-2 scheduler can replace it without
    /// touching callers.
    async fn get_spaced_repetition_quizzes(&self, user_id: &str) -> Result<Vec<Quiz>>;
}
