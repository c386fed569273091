mod common;

use std::time::Duration;

use quiz_engine::models::{QuizLevel, UserAnswer};
use quiz_engine::repository::QuizRepository;
use quiz_engine::services::SessionEvent;

use common::{harness, hinted_ox_quiz, multiple_choice_quiz, ox_quiz, timed_ox_quiz};

#[tokio::test]
async fn answering_three_ox_quizzes_accumulates_score_and_streak() {
    let h = harness(
        "scenario-a",
        vec![
            ox_quiz("q1", 10, true),
            ox_quiz("q2", 10, true),
            ox_quiz("q3", 10, true),
        ],
    );
    let mut events = h.engine.subscribe();
    assert_eq!(h.engine.load_quizzes(QuizLevel::Lv1).await.unwrap(), 3);

    for _ in 0..3 {
        h.engine.set_user_answer(UserAnswer::Boolean(true)).await;
        let result = h.engine.submit_answer().await.unwrap();
        assert!(result.is_correct);
        assert_eq!(result.points_earned, 10);
        h.engine.next_quiz().await;
    }

    let state = h.engine.snapshot().await;
    assert_eq!(state.total_score, 30);
    assert_eq!(state.streak, 3);
    assert_eq!(state.session_results.len(), 3);

    // Persistence ran inline: all three results reached the repository and
    // the streak counters.
    let results = h
        .repository
        .get_quiz_results("scenario-a", None)
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    let stats = h.analytics.user_statistics("scenario-a").await.unwrap();
    assert_eq!(stats.current_streak, 3);
    assert_eq!(stats.longest_streak, 3);

    let completed = events.recv().await.unwrap();
    assert!(matches!(
        completed,
        SessionEvent::Completed { total_score: 30, total_quizzes: 3, .. }
    ));
}

#[tokio::test]
async fn hint_penalty_reduces_earned_points() {
    let h = harness("scenario-b", vec![hinted_ox_quiz("hq")]);
    h.engine.load(vec![hinted_ox_quiz("hq")]).await;

    let hint = h.engine.use_hint(None).await.unwrap();
    assert_eq!(hint.points_penalty, 2);

    h.engine.set_user_answer(UserAnswer::Boolean(true)).await;
    let result = h.engine.submit_answer().await.unwrap();
    assert!(result.is_correct);
    assert_eq!(result.points_earned, 8);
    assert_eq!(result.hints_used, vec![format!("hq-basic")]);
}

#[tokio::test]
async fn load_quizzes_pulls_from_repository_by_level() {
    let h = harness(
        "loader",
        vec![
            ox_quiz("lv1-a", 10, true),
            ox_quiz("lv1-b", 10, true),
            multiple_choice_quiz("lv3-a", 0),
        ],
    );

    let count = h.engine.load_quizzes(QuizLevel::Lv1).await.unwrap();
    assert_eq!(count, 2);
    let state = h.engine.snapshot().await;
    assert_eq!(state.quizzes.len(), 2);
    assert!(state.is_first_quiz());
}

#[tokio::test]
async fn incorrect_answer_lands_in_wrong_answer_ledger() {
    let h = harness("misser", vec![ox_quiz("wrong-1", 10, true)]);
    h.engine.load(vec![ox_quiz("wrong-1", 10, true)]).await;

    h.engine.set_user_answer(UserAnswer::Boolean(false)).await;
    let result = h.engine.submit_answer().await.unwrap();
    assert!(!result.is_correct);
    assert_eq!(result.points_earned, 0);

    let ledger = h.repository.get_wrong_answers("misser").await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].quiz_id, "wrong-1");

    let stats = h.analytics.user_statistics("misser").await.unwrap();
    assert_eq!(stats.current_streak, 0);
}

#[tokio::test]
async fn review_session_replays_missed_quizzes() {
    let h = harness(
        "reviewer",
        vec![ox_quiz("m1", 10, true), ox_quiz("m2", 10, true)],
    );
    h.engine
        .load(vec![ox_quiz("m1", 10, true), ox_quiz("m2", 10, true)])
        .await;

    // Miss both questions.
    for _ in 0..2 {
        h.engine.set_user_answer(UserAnswer::Boolean(false)).await;
        h.engine.submit_answer().await.unwrap();
        h.engine.next_quiz().await;
    }

    let count = h.engine.load_review_quizzes().await.unwrap();
    assert_eq!(count, 2);
    let state = h.engine.snapshot().await;
    assert_eq!(state.total_score, 0);
    assert!(!state.is_answered);
}

#[tokio::test]
async fn timer_expiry_auto_submits_exactly_once() {
    let h = harness("timed", vec![timed_ox_quiz("t1", 1)]);
    let mut events = h.engine.subscribe();
    h.engine.load(vec![timed_ox_quiz("t1", 1)]).await;

    // One tick (20ms in tests) drops 1 -> 0 and fires the auto-submit with
    // no staged answer. Give the loop a few intervals of slack.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let state = h.engine.snapshot().await;
    assert!(state.is_answered);
    assert_eq!(state.is_correct, Some(false));
    assert_eq!(state.time_remaining, Some(0));
    assert_eq!(state.session_results.len(), 1);
    assert_eq!(state.session_results[0].points_earned, 0);

    let expired = events.recv().await.unwrap();
    assert!(matches!(expired, SessionEvent::TimeExpired { .. }));

    let results = h.repository.get_quiz_results("timed", None).await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn manual_submit_beats_the_timer() {
    let h = harness("quick", vec![timed_ox_quiz("t2", 30)]);
    h.engine.load(vec![timed_ox_quiz("t2", 30)]).await;

    h.engine.set_user_answer(UserAnswer::Boolean(true)).await;
    let result = h.engine.submit_answer().await.unwrap();
    assert!(result.is_correct);

    // The timer is torn down on submit; nothing else may be recorded.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let state = h.engine.snapshot().await;
    assert_eq!(state.session_results.len(), 1);
}

#[tokio::test]
async fn reset_session_keeps_quizzes_and_clears_progress() {
    let h = harness("resetter", vec![]);
    h.engine
        .load(vec![ox_quiz("r1", 10, true), ox_quiz("r2", 10, true)])
        .await;

    h.engine.set_user_answer(UserAnswer::Boolean(true)).await;
    h.engine.submit_answer().await.unwrap();
    h.engine.next_quiz().await;

    h.engine.reset_session().await;
    let state = h.engine.snapshot().await;
    assert_eq!(state.quizzes.len(), 2);
    assert_eq!(state.current_index, 0);
    assert_eq!(state.total_score, 0);
    assert!(state.session_results.is_empty());
    assert!(!state.is_answered);
}

#[tokio::test]
async fn navigation_is_clamped_at_session_bounds() {
    let h = harness("walker", vec![]);
    h.engine
        .load(vec![ox_quiz("w1", 10, true), ox_quiz("w2", 10, true)])
        .await;

    h.engine.previous_quiz().await;
    assert_eq!(h.engine.snapshot().await.current_index, 0);

    h.engine.next_quiz().await;
    h.engine.next_quiz().await;
    let state = h.engine.snapshot().await;
    assert_eq!(state.current_index, 1);
    assert!(state.is_last_quiz());
}

#[tokio::test]
async fn concurrent_navigation_keeps_the_countdown_running() {
    let h = harness("racer", vec![]);
    h.engine
        .load(vec![timed_ox_quiz("r1", 60), timed_ox_quiz("r2", 60)])
        .await;

    let engine = &h.engine;
    tokio::join!(engine.next_quiz(), engine.jump_to_quiz(1));

    // Whichever navigation ran last armed the live timer; the question must
    // still be counting down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let state = h.engine.snapshot().await;
    assert_eq!(state.current_index, 1);
    assert!(state.time_remaining.unwrap() < 60);
}

#[tokio::test]
async fn submit_with_no_current_quiz_returns_none() {
    let h = harness("empty", vec![]);
    assert!(h.engine.submit_answer().await.is_none());

    h.engine.load(vec![ox_quiz("only", 10, true)]).await;
    h.engine.set_user_answer(UserAnswer::Boolean(true)).await;
    assert!(h.engine.submit_answer().await.is_some());
    // Second submit on an answered quiz is refused.
    assert!(h.engine.submit_answer().await.is_none());
}

#[tokio::test]
async fn mixed_variant_session_validates_each_shape() {
    let h = harness("mixed", vec![]);
    h.engine
        .load(vec![
            multiple_choice_quiz("mc", 0),
            common::fill_in_blank_quiz("fib"),
        ])
        .await;

    h.engine.set_user_answer(UserAnswer::Choice(0)).await;
    let result = h.engine.submit_answer().await.unwrap();
    assert!(result.is_correct);
    assert_eq!(result.points_earned, 20);

    h.engine.next_quiz().await;
    h.engine
        .set_user_answer(UserAnswer::Blanks(vec![" MUT ".into(), "I32".into()]))
        .await;
    let result = h.engine.submit_answer().await.unwrap();
    assert!(result.is_correct);

    let state = h.engine.snapshot().await;
    assert_eq!(state.total_score, 35);
}
