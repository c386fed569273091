use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::models::QuizResult;

/// Per-quiz attempt aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizStatistics {
    pub quiz_id: String,
    pub attempts: u32,
    pub correct: u32,
    pub average_time_seconds: f64,
}

impl QuizStatistics {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.attempts)
        }
    }
}

/// Running per-user counters. `current_streak` increments on a correct
/// answer and resets on an incorrect one; `longest_streak` is the running
/// maximum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStatistics {
    pub user_id: String,
    pub total_answered: u32,
    pub correct_count: u32,
    pub total_points: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_time_seconds: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPerformance {
    pub user_id: String,
    pub accuracy: f64,
    pub average_time_seconds: f64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressAnalytics {
    pub user_id: String,
    pub total_answered: u32,
    pub total_points: u32,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Read-mostly aggregate queries.
#[async_trait]
pub trait AnalyticsQueries: Send + Sync {
    async fn get_quiz_statistics(&self, quiz_id: &str) -> Result<Option<QuizStatistics>>;

    async fn get_user_performance(&self, user_id: &str) -> Result<UserPerformance>;

    async fn get_progress_analytics(&self, user_id: &str) -> Result<ProgressAnalytics>;
}

/// Narrow event sink invoked after each submitted result. Kept separate from
/// the query surface so the session engine depends only on what it mutates.
#[async_trait]
pub trait StatisticsSink: Send + Sync {
    async fn update_user_statistics(&self, user_id: &str, result: &QuizResult) -> Result<()>;
}

#[derive(Default)]
struct AnalyticsStore {
    users: HashMap<String, UserStatistics>,
    quizzes: HashMap<String, QuizStatistics>,
}

#[derive(Default)]
pub struct InMemoryAnalytics {
    store: RwLock<AnalyticsStore>,
}

impl InMemoryAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_statistics(&self, user_id: &str) -> Option<UserStatistics> {
        self.store.read().await.users.get(user_id).cloned()
    }
}

#[async_trait]
impl AnalyticsQueries for InMemoryAnalytics {
    async fn get_quiz_statistics(&self, quiz_id: &str) -> Result<Option<QuizStatistics>> {
        Ok(self.store.read().await.quizzes.get(quiz_id).cloned())
    }

    async fn get_user_performance(&self, user_id: &str) -> Result<UserPerformance> {
        let store = self.store.read().await;
        let stats = store.users.get(user_id).cloned().unwrap_or_default();
        let accuracy = if stats.total_answered == 0 {
            0.0
        } else {
            f64::from(stats.correct_count) / f64::from(stats.total_answered)
        };
        let average_time = if stats.total_answered == 0 {
            0.0
        } else {
            stats.total_time_seconds as f64 / f64::from(stats.total_answered)
        };
        Ok(UserPerformance {
            user_id: user_id.to_string(),
            accuracy,
            average_time_seconds: average_time,
            current_streak: stats.current_streak,
            longest_streak: stats.longest_streak,
        })
    }

    async fn get_progress_analytics(&self, user_id: &str) -> Result<ProgressAnalytics> {
        let store = self.store.read().await;
        let stats = store.users.get(user_id).cloned().unwrap_or_default();
        Ok(ProgressAnalytics {
            user_id: user_id.to_string(),
            total_answered: stats.total_answered,
            total_points: stats.total_points,
            last_activity: stats.last_activity,
        })
    }
}

#[async_trait]
impl StatisticsSink for InMemoryAnalytics {
    async fn update_user_statistics(&self, user_id: &str, result: &QuizResult) -> Result<()> {
        let mut guard = self.store.write().await;
        let store = &mut *guard;

        let user = store
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserStatistics {
                user_id: user_id.to_string(),
                ..UserStatistics::default()
            });
        user.total_answered += 1;
        user.total_points += result.points_earned;
        user.total_time_seconds += u64::from(result.time_spent_seconds);
        user.last_activity = Some(result.timestamp);
        if result.is_correct {
            user.correct_count += 1;
            user.current_streak += 1;
            user.longest_streak = user.longest_streak.max(user.current_streak);
        } else {
            user.current_streak = 0;
        }

        let quiz = store
            .quizzes
            .entry(result.quiz_id.clone())
            .or_insert_with(|| QuizStatistics {
                quiz_id: result.quiz_id.clone(),
                ..QuizStatistics::default()
            });
        let total_time = quiz.average_time_seconds * f64::from(quiz.attempts)
            + f64::from(result.time_spent_seconds);
        quiz.attempts += 1;
        if result.is_correct {
            quiz.correct += 1;
        }
        quiz.average_time_seconds = total_time / f64::from(quiz.attempts);

        tracing::debug!(
            user_id,
            quiz_id = %result.quiz_id,
            streak = user.current_streak,
            "user statistics updated"
        );
        Ok(())
    }
}
