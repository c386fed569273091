use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::models::{HintLevel, Quiz, QuizHint, QuizLevel, QuizResult, UserAnswer};
use crate::repository::{QuizRepository, StatisticsSink};
use crate::utils::retry::{retry_with_config, RetryConfig};

use super::hint_service::{HintPreview, HintService, HintStatistics};

/// Snapshot of one timed run through an ordered list of quizzes. Owned
/// exclusively by the session engine; the presentation layer only ever sees
/// clones.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub quizzes: Vec<Quiz>,
    pub current_index: usize,
    pub user_answer: Option<UserAnswer>,
    pub is_answered: bool,
    pub is_correct: Option<bool>,
    pub time_remaining: Option<u32>,
    pub hints_used: Vec<String>,
    pub session_start: DateTime<Utc>,
    pub session_results: Vec<QuizResult>,
    pub total_score: u32,
    pub streak: u32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            quizzes: Vec::new(),
            current_index: 0,
            user_answer: None,
            is_answered: false,
            is_correct: None,
            time_remaining: None,
            hints_used: Vec::new(),
            session_start: Utc::now(),
            session_results: Vec::new(),
            total_score: 0,
            streak: 0,
        }
    }
}

impl SessionState {
    pub fn current_quiz(&self) -> Option<&Quiz> {
        self.quizzes.get(self.current_index)
    }

    pub fn is_first_quiz(&self) -> bool {
        self.current_index == 0
    }

    pub fn is_last_quiz(&self) -> bool {
        !self.quizzes.is_empty() && self.current_index == self.quizzes.len() - 1
    }

    /// Fraction of the session reached, counting the current quiz.
    pub fn progress(&self) -> f64 {
        if self.quizzes.is_empty() {
            0.0
        } else {
            (self.current_index + 1) as f64 / self.quizzes.len() as f64
        }
    }

    /// Completion is derived, not a state: last quiz reached and answered.
    pub fn is_complete(&self) -> bool {
        self.is_last_quiz() && self.is_answered
    }
}

/// Transitions accepted by the session reducer.
#[derive(Debug, Clone)]
pub enum SessionAction {
    LoadQuizzes(Vec<Quiz>),
    StartSession,
    SetUserAnswer(UserAnswer),
    SubmitAnswer,
    NextQuiz,
    PreviousQuiz,
    SetCurrentQuiz(usize),
    UseHint(String),
    TickTimer,
    StopTimer,
    RecordResult(QuizResult),
    ResetSession,
}

/// Pure transition function. Every accepted action recomputes derived state
/// synchronously; invariant-violating requests (out-of-bounds navigation,
/// double submit, duplicate hint) degrade to no-ops.
pub fn reduce(mut state: SessionState, action: SessionAction) -> SessionState {
    match action {
        SessionAction::LoadQuizzes(quizzes) => {
            state.quizzes = quizzes;
            state.current_index = 0;
            clear_transient(&mut state);
            state.time_remaining = seed_timer(&state);
        }
        SessionAction::StartSession => {
            state.session_start = Utc::now();
            state.session_results.clear();
            state.total_score = 0;
            state.streak = 0;
        }
        SessionAction::SetUserAnswer(answer) => {
            if !state.is_answered {
                state.user_answer = Some(answer);
            }
        }
        SessionAction::SubmitAnswer => {
            let correct = match state.current_quiz() {
                Some(quiz) if !state.is_answered => Some(
                    state
                        .user_answer
                        .as_ref()
                        .map(|answer| quiz.validate_answer(answer))
                        .unwrap_or(false),
                ),
                _ => None,
            };
            if let Some(correct) = correct {
                state.is_answered = true;
                state.is_correct = Some(correct);
                state.streak = if correct { state.streak + 1 } else { 0 };
            }
        }
        SessionAction::NextQuiz => {
            if !state.quizzes.is_empty() {
                state.current_index = (state.current_index + 1).min(state.quizzes.len() - 1);
            }
            clear_transient(&mut state);
            state.time_remaining = seed_timer(&state);
        }
        SessionAction::PreviousQuiz => {
            state.current_index = state.current_index.saturating_sub(1);
            clear_transient(&mut state);
            state.time_remaining = seed_timer(&state);
        }
        SessionAction::SetCurrentQuiz(index) => {
            if !state.quizzes.is_empty() {
                state.current_index = index.min(state.quizzes.len() - 1);
            }
            clear_transient(&mut state);
            state.time_remaining = seed_timer(&state);
        }
        SessionAction::UseHint(hint_id) => {
            if !state.hints_used.contains(&hint_id) {
                state.hints_used.push(hint_id);
            }
        }
        SessionAction::TickTimer => {
            if let Some(remaining) = state.time_remaining {
                state.time_remaining = Some(remaining.saturating_sub(1));
            }
        }
        SessionAction::StopTimer => {
            state.time_remaining = None;
        }
        SessionAction::RecordResult(result) => {
            state.total_score += result.points_earned;
            state.session_results.push(result);
        }
        SessionAction::ResetSession => {
            let quizzes = mem::take(&mut state.quizzes);
            state = SessionState {
                quizzes,
                ..SessionState::default()
            };
            state.time_remaining = seed_timer(&state);
        }
    }
    state
}

fn clear_transient(state: &mut SessionState) {
    state.user_answer = None;
    state.is_answered = false;
    state.is_correct = None;
    state.hints_used.clear();
}

fn seed_timer(state: &SessionState) -> Option<u32> {
    state
        .current_quiz()
        .and_then(|quiz| quiz.time_limit_seconds)
        .filter(|limit| *limit > 0)
}

/// Points awarded for one answered quiz: zero when incorrect, otherwise the
/// base reward minus each used hint's penalty, floored at zero after every
/// subtraction. Order-independent for non-negative penalties; the iterative
/// subtract-then-floor form is the canonical one.
pub fn score_answer(quiz: &Quiz, hints_used: &[String], is_correct: bool) -> u32 {
    if !is_correct {
        return 0;
    }
    let mut points = quiz.points;
    for hint_id in hints_used {
        if let Some(hint) = quiz.hints.iter().find(|hint| &hint.id == hint_id) {
            points = points.saturating_sub(hint.points_penalty);
        }
    }
    points
}

/// Notifications pushed to the presentation layer alongside state snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    HintUsed {
        quiz_id: String,
        hint_id: String,
        points_penalty: u32,
    },
    TimeExpired {
        quiz_id: String,
    },
    Completed {
        session_id: String,
        total_score: u32,
        total_quizzes: usize,
    },
}

struct SessionCore {
    state: SessionState,
    hints: HintService,
    question_started_at: Instant,
    // Bumped on every (re)arm, submit, and stop so a stale timer task can
    // never tick a question it no longer owns.
    timer_epoch: u64,
}

impl SessionCore {
    fn dispatch(&mut self, action: SessionAction) {
        self.state = reduce(mem::take(&mut self.state), action);
    }

    // Only called after load, navigation, or reset actions, all of which
    // clear `state.hints_used`; the tracker reset is forced so the two stay
    // in lockstep even when the current quiz id is unchanged (clamped
    // navigation, RESET_SESSION).
    fn rebind_hints(&mut self) {
        match self.state.current_quiz().cloned() {
            Some(quiz) => self.hints.reset_for(&quiz),
            None => self.hints.unbind(),
        }
    }
}

struct EngineInner {
    session_id: String,
    user_id: String,
    config: EngineConfig,
    repository: Arc<dyn QuizRepository>,
    statistics: Arc<dyn StatisticsSink>,
    core: Mutex<SessionCore>,
    events: broadcast::Sender<SessionEvent>,
    timer: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Orchestration above the pure reducer: drives the per-question timer,
/// computes scores, and issues best-effort persistence calls that never
/// block or roll back the interactive state.
pub struct SessionEngine {
    inner: Arc<EngineInner>,
}

impl SessionEngine {
    pub fn new(
        user_id: impl Into<String>,
        repository: Arc<dyn QuizRepository>,
        statistics: Arc<dyn StatisticsSink>,
        config: EngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        let inner = EngineInner {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            core: Mutex::new(SessionCore {
                state: SessionState::default(),
                hints: HintService::new(config.max_hints_per_question),
                question_started_at: Instant::now(),
                timer_epoch: 0,
            }),
            config,
            repository,
            statistics,
            events,
            timer: std::sync::Mutex::new(None),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Pulls the level's pool from the repository and starts a fresh session
    /// over it. Repository failures surface as recoverable errors; the
    /// previous session state is left untouched in that case.
    pub async fn load_quizzes(&self, level: QuizLevel) -> Result<usize> {
        let quizzes = self
            .inner
            .repository
            .get_quizzes_by_level(level)
            .await
            .context("loading quizzes for level")?;
        Ok(self.install_quizzes(quizzes).await)
    }

    /// Starts a review session over the user's wrong-answer ledger.
    pub async fn load_review_quizzes(&self) -> Result<usize> {
        let quizzes = self
            .inner
            .repository
            .get_review_quizzes(&self.inner.user_id)
            .await
            .context("loading review quizzes")?;
        Ok(self.install_quizzes(quizzes).await)
    }

    /// Starts a session over an explicit quiz list.
    pub async fn load(&self, quizzes: Vec<Quiz>) -> usize {
        self.install_quizzes(quizzes).await
    }

    async fn install_quizzes(&self, quizzes: Vec<Quiz>) -> usize {
        let count = quizzes.len();
        {
            let mut core = self.inner.core.lock().await;
            core.dispatch(SessionAction::LoadQuizzes(quizzes));
            core.dispatch(SessionAction::StartSession);
            core.rebind_hints();
            core.question_started_at = Instant::now();
            core.timer_epoch += 1;
            // Armed while the core lock is still held; a later navigation
            // cannot have its timer installed before this one's.
            self.arm_timer(core.timer_epoch, core.state.time_remaining.is_some());
        }
        tracing::info!(
            session_id = %self.inner.session_id,
            user_id = %self.inner.user_id,
            count,
            "session loaded"
        );
        count
    }

    pub async fn set_user_answer(&self, answer: UserAnswer) {
        let mut core = self.inner.core.lock().await;
        core.dispatch(SessionAction::SetUserAnswer(answer));
    }

    /// Submits the staged answer for the current quiz. Returns the recorded
    /// result, or `None` when there is no current quiz or it was already
    /// answered.
    pub async fn submit_answer(&self) -> Option<QuizResult> {
        let result = {
            let mut core = self.inner.core.lock().await;
            self.inner.submit_locked(&mut core).await
        };
        if result.is_some() {
            self.cancel_timer();
        }
        result
    }

    pub async fn next_quiz(&self) {
        self.navigate(SessionAction::NextQuiz).await;
    }

    pub async fn previous_quiz(&self) {
        self.navigate(SessionAction::PreviousQuiz).await;
    }

    pub async fn jump_to_quiz(&self, index: usize) {
        self.navigate(SessionAction::SetCurrentQuiz(index)).await;
    }

    async fn navigate(&self, action: SessionAction) {
        let mut core = self.inner.core.lock().await;
        core.dispatch(action);
        core.rebind_hints();
        core.question_started_at = Instant::now();
        core.timer_epoch += 1;
        // Same ordering rule as install_quizzes: arm under the core lock.
        self.arm_timer(core.timer_epoch, core.state.time_remaining.is_some());
    }

    /// Consumes a hint for the current quiz, by id or the next available
    /// one. `None` (no state change) when capped, missing, or already used.
    pub async fn use_hint(&self, hint_id: Option<&str>) -> Option<QuizHint> {
        let mut core = self.inner.core.lock().await;
        let hint = core.hints.use_hint(hint_id)?;
        self.record_hint(&mut core, hint)
    }

    pub async fn use_hint_by_level(&self, level: HintLevel) -> Option<QuizHint> {
        let mut core = self.inner.core.lock().await;
        let hint = core.hints.use_hint_by_level(level)?;
        self.record_hint(&mut core, hint)
    }

    fn record_hint(&self, core: &mut SessionCore, hint: QuizHint) -> Option<QuizHint> {
        core.dispatch(SessionAction::UseHint(hint.id.clone()));
        if let Some(quiz) = core.state.current_quiz() {
            let _ = self.inner.events.send(SessionEvent::HintUsed {
                quiz_id: quiz.id.clone(),
                hint_id: hint.id.clone(),
                points_penalty: hint.points_penalty,
            });
        }
        Some(hint)
    }

    pub async fn hint_statistics(&self) -> HintStatistics {
        self.inner.core.lock().await.hints.hint_statistics()
    }

    pub async fn next_hint_preview(&self) -> Option<HintPreview> {
        self.inner.core.lock().await.hints.next_hint_preview()
    }

    /// Returns to the initial answering state while keeping the loaded quiz
    /// list.
    pub async fn reset_session(&self) {
        self.navigate(SessionAction::ResetSession).await;
    }

    pub async fn stop_timer(&self) {
        {
            let mut core = self.inner.core.lock().await;
            core.dispatch(SessionAction::StopTimer);
            core.timer_epoch += 1;
        }
        self.cancel_timer();
    }

    pub async fn snapshot(&self) -> SessionState {
        self.inner.core.lock().await.state.clone()
    }

    fn arm_timer(&self, epoch: u64, timed: bool) {
        let mut slot = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        if timed {
            *slot = Some(tokio::spawn(tick_loop(self.inner.clone(), epoch)));
        }
    }

    fn cancel_timer(&self) {
        let mut slot = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

impl Drop for SessionEngine {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

impl EngineInner {
    async fn submit_locked(self: &Arc<Self>, core: &mut SessionCore) -> Option<QuizResult> {
        if core.state.is_answered {
            return None;
        }
        let quiz = core.state.current_quiz()?.clone();

        let time_spent = match (quiz.time_limit_seconds, core.state.time_remaining) {
            (Some(limit), Some(remaining)) => limit.saturating_sub(remaining),
            _ => core
                .question_started_at
                .elapsed()
                .as_secs()
                .try_into()
                .unwrap_or(u32::MAX),
        };

        core.dispatch(SessionAction::SubmitAnswer);
        let is_correct = core.state.is_correct.unwrap_or(false);
        let points_earned = score_answer(&quiz, &core.state.hints_used, is_correct);

        let result = QuizResult {
            quiz_id: quiz.id.clone(),
            user_id: self.user_id.clone(),
            is_correct,
            user_answer: core.state.user_answer.clone(),
            time_spent_seconds: time_spent,
            hints_used: core.state.hints_used.clone(),
            points_earned,
            timestamp: Utc::now(),
            explanation: if quiz.explanation.is_empty() {
                None
            } else {
                Some(quiz.explanation.clone())
            },
        };

        core.dispatch(SessionAction::RecordResult(result.clone()));
        core.timer_epoch += 1;

        tracing::info!(
            session_id = %self.session_id,
            quiz_id = %quiz.id,
            correct = is_correct,
            points = points_earned,
            streak = core.state.streak,
            "answer submitted"
        );

        if core.state.is_complete() {
            let _ = self.events.send(SessionEvent::Completed {
                session_id: self.session_id.clone(),
                total_score: core.state.total_score,
                total_quizzes: core.state.quizzes.len(),
            });
            tracing::info!(
                session_id = %self.session_id,
                total_score = core.state.total_score,
                "session complete"
            );
        }

        self.persist_result(result.clone()).await;
        Some(result)
    }

    /// Persistence never blocks or reverts the user's local progress: by
    /// default it runs on a detached task, and every failure is logged and
    /// swallowed.
    async fn persist_result(&self, result: QuizResult) {
        let repository = self.repository.clone();
        let statistics = self.statistics.clone();
        if self.config.persist_async {
            tokio::spawn(async move {
                persist_best_effort(repository, statistics, result).await;
            });
        } else {
            persist_best_effort(repository, statistics, result).await;
        }
    }
}

async fn persist_best_effort(
    repository: Arc<dyn QuizRepository>,
    statistics: Arc<dyn StatisticsSink>,
    result: QuizResult,
) {
    let cfg = RetryConfig::persistence();

    if let Err(error) = retry_with_config(cfg.clone(), || async {
        repository.save_quiz_result(&result).await
    })
    .await
    {
        tracing::error!(%error, quiz_id = %result.quiz_id, "failed to save quiz result");
    }

    if !result.is_correct {
        if let Err(error) = retry_with_config(cfg, || async {
            repository
                .add_to_wrong_answers(&result.user_id, &result.quiz_id)
                .await
        })
        .await
        {
            tracing::error!(%error, quiz_id = %result.quiz_id, "failed to record wrong answer");
        }
    }

    if let Err(error) = statistics
        .update_user_statistics(&result.user_id, &result)
        .await
    {
        tracing::error!(%error, user_id = %result.user_id, "failed to update user statistics");
    }
}

/// One task per timed question. Ticks down once per interval while time
/// remains; when the counter hits exactly zero on an unanswered question it
/// auto-submits whatever answer is staged, exactly once, then exits.
async fn tick_loop(inner: Arc<EngineInner>, epoch: u64) {
    let interval = Duration::from_millis(inner.config.tick_interval_ms);
    loop {
        tokio::time::sleep(interval).await;
        let mut core = inner.core.lock().await;
        if core.timer_epoch != epoch || core.state.is_answered {
            return;
        }
        let remaining = match core.state.time_remaining {
            Some(remaining) if remaining > 0 => remaining,
            _ => return,
        };

        core.dispatch(SessionAction::TickTimer);

        if remaining == 1 {
            if let Some(quiz) = core.state.current_quiz() {
                let _ = inner.events.send(SessionEvent::TimeExpired {
                    quiz_id: quiz.id.clone(),
                });
            }
            inner.submit_locked(&mut core).await;
            return;
        }
    }
}
