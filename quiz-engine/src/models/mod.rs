use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub mod factory;
pub mod hint;
pub mod result;

pub use factory::create_quiz;
pub use hint::{HintLevel, QuizHint};
pub use result::{QuizProgress, QuizResult, WrongAnswer};

/// Difficulty tier a quiz belongs to (LV1 is the entry tier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QuizLevel {
    #[serde(rename = "LV1")]
    Lv1,
    #[serde(rename = "LV2")]
    Lv2,
    #[serde(rename = "LV3")]
    Lv3,
    #[serde(rename = "LV4")]
    Lv4,
    #[serde(rename = "LV5")]
    Lv5,
}

impl QuizLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizLevel::Lv1 => "LV1",
            QuizLevel::Lv2 => "LV2",
            QuizLevel::Lv3 => "LV3",
            QuizLevel::Lv4 => "LV4",
            QuizLevel::Lv5 => "LV5",
        }
    }
}

/// Qualitative difficulty band, orthogonal to the level tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    VeryHard,
}

/// Discriminant for the supported quiz variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizType {
    Ox,
    MultipleChoice,
    FillInBlank,
}

impl QuizType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizType::Ox => "ox",
            QuizType::MultipleChoice => "multiple_choice",
            QuizType::FillInBlank => "fill_in_blank",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
}

/// One blank slot in a fill-in-the-blank quiz with its accepted answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlankField {
    pub id: String,
    pub accepted_answers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Variant payload of a quiz, closed over the three supported types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuizKind {
    Ox {
        correct_answer: bool,
    },
    MultipleChoice {
        options: Vec<ChoiceOption>,
        correct_answer_index: usize,
    },
    FillInBlank {
        blanks: Vec<BlankField>,
        code_context: String,
    },
}

impl QuizKind {
    pub fn quiz_type(&self) -> QuizType {
        match self {
            QuizKind::Ox { .. } => QuizType::Ox,
            QuizKind::MultipleChoice { .. } => QuizType::MultipleChoice,
            QuizKind::FillInBlank { .. } => QuizType::FillInBlank,
        }
    }
}

/// Answer submitted by the user. The shape depends on the quiz variant; a
/// mismatched shape validates as incorrect rather than failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserAnswer {
    Boolean(bool),
    Choice(usize),
    Blanks(Vec<String>),
}

/// An immutable question entity. Constructed only through
/// [`factory::create_quiz`]; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub level: QuizLevel,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub question: String,
    pub category: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_seconds: Option<u32>,
    pub points: u32,
    #[serde(default)]
    pub hints: Vec<QuizHint>,
    #[serde(default)]
    pub explanation: String,
    #[serde(flatten)]
    pub kind: QuizKind,
}

impl Quiz {
    pub fn quiz_type(&self) -> QuizType {
        self.kind.quiz_type()
    }

    /// Checks a user answer against this quiz. Total over any input: a
    /// malformed shape (wrong variant, wrong blank count) is incorrect,
    /// never an error.
    pub fn validate_answer(&self, answer: &UserAnswer) -> bool {
        match (&self.kind, answer) {
            (QuizKind::Ox { correct_answer }, UserAnswer::Boolean(given)) => {
                given == correct_answer
            }
            (
                QuizKind::MultipleChoice {
                    correct_answer_index,
                    ..
                },
                UserAnswer::Choice(given),
            ) => given == correct_answer_index,
            (QuizKind::FillInBlank { blanks, .. }, UserAnswer::Blanks(given)) => {
                given.len() == blanks.len()
                    && blanks
                        .iter()
                        .zip(given.iter())
                        .all(|(blank, answer)| blank_matches(blank, answer))
            }
            _ => false,
        }
    }

    /// Hints in the order they were defined at construction.
    pub fn get_hints(&self) -> &[QuizHint] {
        &self.hints
    }

    pub fn get_explanation(&self) -> &str {
        &self.explanation
    }

    pub fn is_time_limited(&self) -> bool {
        matches!(self.time_limit_seconds, Some(t) if t > 0)
    }
}

fn blank_matches(blank: &BlankField, answer: &str) -> bool {
    let normalized = answer.trim().to_lowercase();
    blank
        .accepted_answers
        .iter()
        .any(|accepted| accepted.trim().to_lowercase() == normalized)
}
