use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{QuizLevel, UserAnswer};

/// Outcome of one submitted answer. Created once per submission, then handed
/// to the repository for best-effort persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub quiz_id: String,
    pub user_id: String,
    pub is_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<UserAnswer>,
    pub time_spent_seconds: u32,
    pub hints_used: Vec<String>,
    pub points_earned: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Per `(user, level)` aggregate, updated in place after each result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizProgress {
    pub user_id: String,
    pub level: QuizLevel,
    pub total_answered: u32,
    pub correct_count: u32,
    pub total_points: u32,
    pub average_time_seconds: f64,
    pub last_activity: DateTime<Utc>,
}

impl QuizProgress {
    pub fn new(user_id: &str, level: QuizLevel) -> Self {
        Self {
            user_id: user_id.to_string(),
            level,
            total_answered: 0,
            correct_count: 0,
            total_points: 0,
            average_time_seconds: 0.0,
            last_activity: Utc::now(),
        }
    }

    /// Folds one result into the aggregate.
    pub fn record(&mut self, result: &QuizResult) {
        let total_time =
            self.average_time_seconds * f64::from(self.total_answered) + f64::from(result.time_spent_seconds);
        self.total_answered += 1;
        if result.is_correct {
            self.correct_count += 1;
        }
        self.total_points += result.points_earned;
        self.average_time_seconds = total_time / f64::from(self.total_answered);
        self.last_activity = result.timestamp;
    }
}

/// Entry in the per-user wrong-answer ledger. Repeat misses bump
/// `miss_count` instead of duplicating the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrongAnswer {
    pub user_id: String,
    pub quiz_id: String,
    pub recorded_at: DateTime<Utc>,
    pub miss_count: u32,
}
