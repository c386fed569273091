use serde_json::Value;

use crate::error::FactoryError;

use super::{Quiz, QuizKind};

/// Builds a quiz from its type discriminant and a raw payload. This is the
/// single construction path for [`Quiz`]: unknown discriminants fail with
/// [`FactoryError::UnsupportedType`], structural violations with
/// [`FactoryError::InvalidQuiz`].
pub fn create_quiz(quiz_type: &str, data: Value) -> Result<Quiz, FactoryError> {
    let tag = match quiz_type {
        "ox" | "OX" => "ox",
        "multiple_choice" => "multiple_choice",
        "fill_in_blank" => "fill_in_blank",
        other => return Err(FactoryError::UnsupportedType(other.to_string())),
    };

    let mut data = data;
    match data.as_object_mut() {
        Some(object) => {
            object.insert("type".to_string(), Value::String(tag.to_string()));
        }
        None => {
            return Err(FactoryError::InvalidQuiz {
                quiz_id: String::new(),
                reason: "payload must be a JSON object".to_string(),
            })
        }
    }

    let quiz: Quiz = serde_json::from_value(data)?;
    validate(&quiz)?;
    Ok(quiz)
}

fn validate(quiz: &Quiz) -> Result<(), FactoryError> {
    let invalid = |reason: String| FactoryError::InvalidQuiz {
        quiz_id: quiz.id.clone(),
        reason,
    };

    if let Some(limit) = quiz.time_limit_seconds {
        if limit == 0 {
            return Err(invalid("time_limit_seconds must be absent or > 0".to_string()));
        }
    }

    match &quiz.kind {
        QuizKind::Ox { .. } => {}
        QuizKind::MultipleChoice {
            options,
            correct_answer_index,
        } => {
            if options.is_empty() {
                return Err(invalid("multiple choice quiz needs at least one option".to_string()));
            }
            if *correct_answer_index >= options.len() {
                return Err(invalid(format!(
                    "correct_answer_index {} out of range for {} options",
                    correct_answer_index,
                    options.len()
                )));
            }
        }
        QuizKind::FillInBlank { blanks, .. } => {
            if blanks.is_empty() {
                return Err(invalid("fill-in-blank quiz needs at least one blank".to_string()));
            }
            if blanks.iter().any(|blank| blank.accepted_answers.is_empty()) {
                return Err(invalid("every blank needs at least one accepted answer".to_string()));
            }
        }
    }

    Ok(())
}
