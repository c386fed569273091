use serde::{Deserialize, Serialize};

/// Disclosure tier of a hint. The ordering drives selection: cheaper tiers
/// are offered before the solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HintLevel {
    Basic,
    Intermediate,
    Advanced,
    Solution,
}

impl HintLevel {
    /// All levels in ascending disclosure order.
    pub const ORDERED: [HintLevel; 4] = [
        HintLevel::Basic,
        HintLevel::Intermediate,
        HintLevel::Advanced,
        HintLevel::Solution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HintLevel::Basic => "BASIC",
            HintLevel::Intermediate => "INTERMEDIATE",
            HintLevel::Advanced => "ADVANCED",
            HintLevel::Solution => "SOLUTION",
        }
    }
}

/// A priced disclosure owned by its parent quiz. Using it before a correct
/// submission reduces the awarded points by `points_penalty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizHint {
    pub id: String,
    pub content: String,
    pub level: HintLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_condition: Option<String>,
    #[serde(default)]
    pub points_penalty: u32,
}
