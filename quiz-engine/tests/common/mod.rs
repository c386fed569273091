use std::sync::Arc;

use serde_json::json;

use quiz_engine::config::EngineConfig;
use quiz_engine::models::{create_quiz, Quiz};
use quiz_engine::repository::{InMemoryAnalytics, InMemoryQuizRepository};
use quiz_engine::services::SessionEngine;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Deterministic test config: fast ticks, persistence awaited inline so
/// assertions can run right after a submit.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        max_hints_per_question: 3,
        tick_interval_ms: 20,
        persist_async: false,
    }
}

pub struct TestHarness {
    pub engine: SessionEngine,
    pub repository: Arc<InMemoryQuizRepository>,
    pub analytics: Arc<InMemoryAnalytics>,
}

pub fn harness(user_id: &str, quizzes: Vec<Quiz>) -> TestHarness {
    init_tracing();
    let repository = Arc::new(InMemoryQuizRepository::new(quizzes));
    let analytics = Arc::new(InMemoryAnalytics::new());
    let engine = SessionEngine::new(
        user_id,
        repository.clone(),
        analytics.clone(),
        test_config(),
    );
    TestHarness {
        engine,
        repository,
        analytics,
    }
}

pub fn ox_quiz(id: &str, points: u32, correct: bool) -> Quiz {
    create_quiz(
        "ox",
        json!({
            "id": id,
            "level": "LV1",
            "question": format!("statement {id}"),
            "category": "rust",
            "points": points,
            "correct_answer": correct
        }),
    )
    .unwrap()
}

pub fn timed_ox_quiz(id: &str, limit_seconds: u32) -> Quiz {
    create_quiz(
        "ox",
        json!({
            "id": id,
            "level": "LV2",
            "question": format!("timed statement {id}"),
            "category": "rust",
            "points": 10,
            "time_limit_seconds": limit_seconds,
            "correct_answer": true
        }),
    )
    .unwrap()
}

pub fn hinted_ox_quiz(id: &str) -> Quiz {
    create_quiz(
        "ox",
        json!({
            "id": id,
            "level": "LV1",
            "question": format!("hinted statement {id}"),
            "category": "rust",
            "points": 10,
            "correct_answer": true,
            "explanation": "true because of move semantics",
            "hints": [
                { "id": format!("{id}-basic"), "content": "think ownership", "level": "BASIC", "points_penalty": 2 },
                { "id": format!("{id}-adv"), "content": "values move on assignment", "level": "ADVANCED", "points_penalty": 5 },
                { "id": format!("{id}-sol"), "content": "the answer is true", "level": "SOLUTION", "points_penalty": 8 }
            ]
        }),
    )
    .unwrap()
}

pub fn multiple_choice_quiz(id: &str, correct_index: usize) -> Quiz {
    create_quiz(
        "multiple_choice",
        json!({
            "id": id,
            "level": "LV3",
            "difficulty": "hard",
            "question": "which keyword introduces a lifetime?",
            "category": "syntax",
            "tags": ["lifetimes", "syntax"],
            "points": 20,
            "options": [
                { "id": "a", "text": "'a" },
                { "id": "b", "text": "&mut" },
                { "id": "c", "text": "dyn" }
            ],
            "correct_answer_index": correct_index
        }),
    )
    .unwrap()
}

pub fn fill_in_blank_quiz(id: &str) -> Quiz {
    create_quiz(
        "fill_in_blank",
        json!({
            "id": id,
            "level": "LV2",
            "question": "complete the declaration",
            "category": "syntax",
            "tags": ["bindings"],
            "points": 15,
            "code_context": "let ___ x: ___ = 1;",
            "blanks": [
                { "id": "b1", "accepted_answers": ["mut"] },
                { "id": "b2", "accepted_answers": ["i32", "u32"] }
            ]
        }),
    )
    .unwrap()
}
