use serde::Serialize;

use crate::models::{HintLevel, Quiz, QuizHint};

type HintUsedCallback = Box<dyn Fn(&QuizHint) + Send + Sync>;
type PenaltyCallback = Box<dyn Fn(u32) + Send + Sync>;

/// Summary of hint consumption for the current quiz, safe to hand to a
/// presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HintStatistics {
    pub total_hints: usize,
    pub used_hints: usize,
    pub remaining_hints: usize,
    pub total_points_penalty: u32,
    pub by_level: Vec<HintLevelUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HintLevelUsage {
    pub level: HintLevel,
    pub available: usize,
    pub used: usize,
}

/// Cost preview of the next hint without revealing its content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HintPreview {
    pub level: HintLevel,
    pub points_penalty: u32,
    pub unlock_condition: Option<String>,
}

/// Tracks hint consumption and penalty accrual for the quiz currently bound
/// to it. All state resets whenever the bound quiz changes, mirroring the
/// session reducer's `hints_used` reset on navigation.
pub struct HintService {
    available_hints: Vec<QuizHint>,
    used_hint_ids: Vec<String>,
    hint_usage_count: u32,
    max_hints_allowed: u32,
    total_points_penalty: u32,
    bound_quiz_id: Option<String>,
    on_hint_used: Option<HintUsedCallback>,
    on_points_penalized: Option<PenaltyCallback>,
}

impl HintService {
    pub fn new(max_hints_allowed: u32) -> Self {
        Self {
            available_hints: Vec::new(),
            used_hint_ids: Vec::new(),
            hint_usage_count: 0,
            max_hints_allowed,
            total_points_penalty: 0,
            bound_quiz_id: None,
            on_hint_used: None,
            on_points_penalized: None,
        }
    }

    pub fn on_hint_used(&mut self, callback: HintUsedCallback) {
        self.on_hint_used = Some(callback);
    }

    pub fn on_points_penalized(&mut self, callback: PenaltyCallback) {
        self.on_points_penalized = Some(callback);
    }

    /// Binds the tracker to a quiz. A change of quiz id resets all usage
    /// state; rebinding the same quiz is a no-op.
    pub fn bind_quiz(&mut self, quiz: &Quiz) {
        if self.bound_quiz_id.as_deref() == Some(quiz.id.as_str()) {
            return;
        }
        tracing::debug!(quiz_id = %quiz.id, "hint tracker rebound");
        self.available_hints = quiz.get_hints().to_vec();
        self.used_hint_ids.clear();
        self.hint_usage_count = 0;
        self.total_points_penalty = 0;
        self.bound_quiz_id = Some(quiz.id.clone());
    }

    /// Binds the tracker to a quiz and discards all usage state, even when
    /// the quiz id is unchanged. Navigation and session resets go through
    /// here: the reducer clears its `hints_used` on every navigation action,
    /// including clamped ones, and the tracker must agree.
    pub fn reset_for(&mut self, quiz: &Quiz) {
        self.bound_quiz_id = None;
        self.bind_quiz(quiz);
    }

    pub fn unbind(&mut self) {
        self.available_hints.clear();
        self.used_hint_ids.clear();
        self.hint_usage_count = 0;
        self.total_points_penalty = 0;
        self.bound_quiz_id = None;
    }

    pub fn can_use_hint(&self, level: Option<HintLevel>) -> bool {
        if self.hint_usage_count >= self.max_hints_allowed {
            return false;
        }
        match level {
            Some(level) => self
                .unused_hints()
                .any(|hint| hint.level == level),
            None => self.unused_hints().next().is_some(),
        }
    }

    /// First unused hint scanning levels in ascending disclosure order;
    /// falls back to plain list order when no level matches.
    pub fn get_next_available_hint(&self) -> Option<&QuizHint> {
        for level in HintLevel::ORDERED {
            if let Some(hint) = self.unused_hints().find(|hint| hint.level == level) {
                return Some(hint);
            }
        }
        self.unused_hints().next()
    }

    /// Consumes a hint, by id or the next available one. Returns `None`
    /// without any state change when the hint is missing, already used, or
    /// the usage cap is reached.
    pub fn use_hint(&mut self, hint_id: Option<&str>) -> Option<QuizHint> {
        if self.hint_usage_count >= self.max_hints_allowed {
            tracing::debug!(
                max = self.max_hints_allowed,
                "hint cap reached, request ignored"
            );
            return None;
        }

        let hint = match hint_id {
            Some(id) => {
                if self.used_hint_ids.iter().any(|used| used == id) {
                    return None;
                }
                self.available_hints.iter().find(|hint| hint.id == id)?
            }
            None => self.get_next_available_hint()?,
        }
        .clone();

        self.used_hint_ids.push(hint.id.clone());
        self.hint_usage_count += 1;
        self.total_points_penalty += hint.points_penalty;

        if let Some(callback) = &self.on_hint_used {
            callback(&hint);
        }
        if hint.points_penalty > 0 {
            if let Some(callback) = &self.on_points_penalized {
                callback(hint.points_penalty);
            }
        }

        Some(hint)
    }

    /// Consumes the first unused hint of exactly the given level.
    pub fn use_hint_by_level(&mut self, level: HintLevel) -> Option<QuizHint> {
        let id = self
            .unused_hints()
            .find(|hint| hint.level == level)?
            .id
            .clone();
        self.use_hint(Some(&id))
    }

    pub fn used_hint_ids(&self) -> &[String] {
        &self.used_hint_ids
    }

    pub fn total_points_penalty(&self) -> u32 {
        self.total_points_penalty
    }

    pub fn hint_statistics(&self) -> HintStatistics {
        let by_level = HintLevel::ORDERED
            .iter()
            .map(|&level| HintLevelUsage {
                level,
                available: self
                    .available_hints
                    .iter()
                    .filter(|hint| hint.level == level)
                    .count(),
                used: self
                    .available_hints
                    .iter()
                    .filter(|hint| hint.level == level && self.is_used(&hint.id))
                    .count(),
            })
            .collect();

        HintStatistics {
            total_hints: self.available_hints.len(),
            used_hints: self.used_hint_ids.len(),
            remaining_hints: self.available_hints.len() - self.used_hint_ids.len(),
            total_points_penalty: self.total_points_penalty,
            by_level,
        }
    }

    /// Exposes the next hint's cost without revealing its content.
    pub fn next_hint_preview(&self) -> Option<HintPreview> {
        self.get_next_available_hint().map(|hint| HintPreview {
            level: hint.level,
            points_penalty: hint.points_penalty,
            unlock_condition: hint.unlock_condition.clone(),
        })
    }

    fn is_used(&self, hint_id: &str) -> bool {
        self.used_hint_ids.iter().any(|used| used == hint_id)
    }

    fn unused_hints(&self) -> impl Iterator<Item = &QuizHint> {
        self.available_hints
            .iter()
            .filter(|hint| !self.is_used(&hint.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::create_quiz;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quiz_with_hints() -> Quiz {
        create_quiz(
            "ox",
            json!({
                "id": "hinted",
                "level": "LV1",
                "question": "?",
                "category": "rust",
                "points": 10,
                "correct_answer": true,
                "hints": [
                    { "id": "h-sol", "content": "the answer", "level": "SOLUTION", "points_penalty": 8 },
                    { "id": "h-basic", "content": "a nudge", "level": "BASIC", "points_penalty": 2 },
                    { "id": "h-adv", "content": "a push", "level": "ADVANCED", "points_penalty": 5 }
                ]
            }),
        )
        .unwrap()
    }

    fn bound_service() -> HintService {
        let mut service = HintService::new(3);
        service.bind_quiz(&quiz_with_hints());
        service
    }

    #[test]
    fn next_hint_follows_level_order_not_list_order() {
        let service = bound_service();
        assert_eq!(service.get_next_available_hint().unwrap().id, "h-basic");
    }

    #[test]
    fn use_hint_without_id_walks_levels_upward() {
        let mut service = bound_service();
        assert_eq!(service.use_hint(None).unwrap().id, "h-basic");
        assert_eq!(service.use_hint(None).unwrap().id, "h-adv");
        assert_eq!(service.use_hint(None).unwrap().id, "h-sol");
        assert_eq!(service.total_points_penalty(), 15);
    }

    #[test]
    fn replaying_a_used_hint_id_changes_nothing() {
        let mut service = bound_service();
        assert!(service.use_hint(Some("h-basic")).is_some());
        let penalty = service.total_points_penalty();

        assert!(service.use_hint(Some("h-basic")).is_none());
        assert_eq!(service.total_points_penalty(), penalty);
        assert_eq!(service.used_hint_ids().len(), 1);
    }

    #[test]
    fn cap_blocks_further_hints() {
        let mut service = HintService::new(1);
        service.bind_quiz(&quiz_with_hints());

        assert!(service.use_hint(None).is_some());
        assert!(!service.can_use_hint(None));
        assert!(service.use_hint(Some("h-adv")).is_none());
    }

    #[test]
    fn can_use_hint_checks_exact_level() {
        let mut service = bound_service();
        assert!(service.can_use_hint(Some(HintLevel::Advanced)));
        service.use_hint_by_level(HintLevel::Advanced).unwrap();
        assert!(!service.can_use_hint(Some(HintLevel::Advanced)));
        assert!(service.can_use_hint(Some(HintLevel::Basic)));
    }

    #[test]
    fn rebinding_a_different_quiz_resets_state() {
        let mut service = bound_service();
        service.use_hint(None).unwrap();

        let other = create_quiz(
            "ox",
            json!({
                "id": "other",
                "level": "LV1",
                "question": "?",
                "category": "rust",
                "points": 10,
                "correct_answer": false,
                "hints": [{ "id": "x", "content": "c", "level": "BASIC" }]
            }),
        )
        .unwrap();
        service.bind_quiz(&other);

        assert!(service.used_hint_ids().is_empty());
        assert_eq!(service.total_points_penalty(), 0);
        assert_eq!(service.hint_statistics().total_hints, 1);
    }

    #[test]
    fn rebinding_the_same_quiz_keeps_usage() {
        let mut service = bound_service();
        service.use_hint(None).unwrap();
        service.bind_quiz(&quiz_with_hints());
        assert_eq!(service.used_hint_ids().len(), 1);
    }

    #[test]
    fn reset_for_discards_usage_even_for_the_same_quiz() {
        let mut service = bound_service();
        service.use_hint(None).unwrap();

        service.reset_for(&quiz_with_hints());
        assert!(service.used_hint_ids().is_empty());
        assert_eq!(service.total_points_penalty(), 0);
        assert_eq!(service.get_next_available_hint().unwrap().id, "h-basic");
    }

    #[test]
    fn callbacks_fire_and_zero_penalty_skips_penalty_callback() {
        let quiz = create_quiz(
            "ox",
            json!({
                "id": "cb",
                "level": "LV1",
                "question": "?",
                "category": "rust",
                "points": 10,
                "correct_answer": true,
                "hints": [
                    { "id": "free", "content": "on the house", "level": "BASIC" },
                    { "id": "paid", "content": "costly", "level": "ADVANCED", "points_penalty": 4 }
                ]
            }),
        )
        .unwrap();

        let used = Arc::new(AtomicU32::new(0));
        let penalized = Arc::new(AtomicU32::new(0));
        let mut service = HintService::new(3);
        service.bind_quiz(&quiz);
        let used_clone = used.clone();
        service.on_hint_used(Box::new(move |_| {
            used_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let penalized_clone = penalized.clone();
        service.on_points_penalized(Box::new(move |penalty| {
            penalized_clone.fetch_add(penalty, Ordering::SeqCst);
        }));

        service.use_hint(Some("free")).unwrap();
        service.use_hint(Some("paid")).unwrap();

        assert_eq!(used.load(Ordering::SeqCst), 2);
        assert_eq!(penalized.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn statistics_and_preview_expose_cost_not_content() {
        let mut service = bound_service();
        service.use_hint_by_level(HintLevel::Basic).unwrap();

        let stats = service.hint_statistics();
        assert_eq!(stats.total_hints, 3);
        assert_eq!(stats.used_hints, 1);
        assert_eq!(stats.remaining_hints, 2);
        let basic = stats
            .by_level
            .iter()
            .find(|usage| usage.level == HintLevel::Basic)
            .unwrap();
        assert_eq!((basic.available, basic.used), (1, 1));

        let preview = service.next_hint_preview().unwrap();
        assert_eq!(preview.level, HintLevel::Advanced);
        assert_eq!(preview.points_penalty, 5);
    }
}
