use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::seq::IndexedRandom;
use tokio::sync::RwLock;

use crate::models::{Quiz, QuizLevel, QuizProgress, QuizResult, QuizType, WrongAnswer};

use super::{Cache, QuizRepository, SearchQuery};

const CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Default)]
struct Store {
    quizzes: Vec<Quiz>,
    results: Vec<QuizResult>,
    progress: HashMap<(String, QuizLevel), QuizProgress>,
    wrong_answers: Vec<WrongAnswer>,
}

/// In-memory repository backing the session engine. An optional cache keeps
/// hot quiz lookups off the store; keys follow `quiz:{id}` and
/// `quizzes:level:{level}` and are invalidated with glob patterns on writes.
pub struct InMemoryQuizRepository {
    store: RwLock<Store>,
    cache: Option<Arc<dyn Cache>>,
}

impl InMemoryQuizRepository {
    pub fn new(quizzes: Vec<Quiz>) -> Self {
        Self {
            store: RwLock::new(Store {
                quizzes,
                ..Store::default()
            }),
            cache: None,
        }
    }

    pub fn with_cache(quizzes: Vec<Quiz>, cache: Arc<dyn Cache>) -> Self {
        Self {
            store: RwLock::new(Store {
                quizzes,
                ..Store::default()
            }),
            cache: Some(cache),
        }
    }

    pub async fn insert_quiz(&self, quiz: Quiz) {
        let mut store = self.store.write().await;
        if let Some(cache) = &self.cache {
            cache.invalidate(&format!("quiz:{}", quiz.id));
            cache.invalidate(&format!("quizzes:level:{}*", quiz.level.as_str()));
        }
        store.quizzes.retain(|existing| existing.id != quiz.id);
        store.quizzes.push(quiz);
    }

    fn cached_quiz(&self, id: &str) -> Option<Quiz> {
        let cache = self.cache.as_ref()?;
        let value = cache.get(&format!("quiz:{id}"))?;
        serde_json::from_value(value).ok()
    }

    fn cache_quiz(&self, quiz: &Quiz) {
        if let Some(cache) = &self.cache {
            if let Ok(value) = serde_json::to_value(quiz) {
                cache.set(&format!("quiz:{}", quiz.id), value, Some(CACHE_TTL));
            }
        }
    }
}

#[async_trait]
impl QuizRepository for InMemoryQuizRepository {
    async fn get_quiz_by_id(&self, id: &str) -> Result<Option<Quiz>> {
        if let Some(quiz) = self.cached_quiz(id) {
            tracing::debug!(id, "quiz served from cache");
            return Ok(Some(quiz));
        }
        let store = self.store.read().await;
        let quiz = store.quizzes.iter().find(|quiz| quiz.id == id).cloned();
        if let Some(quiz) = &quiz {
            self.cache_quiz(quiz);
        }
        Ok(quiz)
    }

    async fn get_quizzes_by_level(&self, level: QuizLevel) -> Result<Vec<Quiz>> {
        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(&format!("quizzes:level:{}", level.as_str())) {
                if let Ok(quizzes) = serde_json::from_value::<Vec<Quiz>>(value) {
                    tracing::debug!(level = level.as_str(), "level pool served from cache");
                    return Ok(quizzes);
                }
            }
        }

        let store = self.store.read().await;
        let quizzes: Vec<Quiz> = store
            .quizzes
            .iter()
            .filter(|quiz| quiz.level == level)
            .cloned()
            .collect();

        if let Some(cache) = &self.cache {
            if let Ok(value) = serde_json::to_value(&quizzes) {
                cache.set(
                    &format!("quizzes:level:{}", level.as_str()),
                    value,
                    Some(CACHE_TTL),
                );
            }
        }
        Ok(quizzes)
    }

    async fn get_quizzes_by_type(&self, quiz_type: QuizType) -> Result<Vec<Quiz>> {
        let store = self.store.read().await;
        Ok(store
            .quizzes
            .iter()
            .filter(|quiz| quiz.quiz_type() == quiz_type)
            .cloned()
            .collect())
    }

    async fn get_random_quiz(
        &self,
        level: QuizLevel,
        exclude_ids: &[String],
    ) -> Result<Option<Quiz>> {
        let store = self.store.read().await;
        let pool: Vec<&Quiz> = store
            .quizzes
            .iter()
            .filter(|quiz| quiz.level == level && !exclude_ids.contains(&quiz.id))
            .collect();
        Ok(pool.choose(&mut rand::rng()).map(|quiz| (*quiz).clone()))
    }

    async fn search_quizzes(&self, query: &SearchQuery) -> Result<Vec<Quiz>> {
        let store = self.store.read().await;
        let keyword = query.keyword.as_ref().map(|k| k.to_lowercase());

        let filtered = store.quizzes.iter().filter(|quiz| {
            if let Some(level) = query.level {
                if quiz.level != level {
                    return false;
                }
            }
            if let Some(quiz_type) = query.quiz_type {
                if quiz.quiz_type() != quiz_type {
                    return false;
                }
            }
            if let Some(category) = &query.category {
                if !quiz.category.eq_ignore_ascii_case(category) {
                    return false;
                }
            }
            if !query.tags.iter().all(|tag| quiz.tags.contains(tag)) {
                return false;
            }
            if let Some(keyword) = &keyword {
                let haystack = format!("{} {}", quiz.question, quiz.explanation).to_lowercase();
                if !haystack.contains(keyword) {
                    return false;
                }
            }
            true
        });

        let page: Vec<Quiz> = match query.limit {
            Some(limit) => filtered.skip(query.offset).take(limit).cloned().collect(),
            None => filtered.skip(query.offset).cloned().collect(),
        };
        Ok(page)
    }

    async fn save_quiz_result(&self, result: &QuizResult) -> Result<()> {
        let mut store = self.store.write().await;

        let level = store
            .quizzes
            .iter()
            .find(|quiz| quiz.id == result.quiz_id)
            .map(|quiz| quiz.level);

        store.results.push(result.clone());

        match level {
            Some(level) => {
                let key = (result.user_id.clone(), level);
                let progress = store
                    .progress
                    .entry(key)
                    .or_insert_with(|| QuizProgress::new(&result.user_id, level));
                progress.record(result);
            }
            None => {
                tracing::warn!(
                    quiz_id = %result.quiz_id,
                    "result references unknown quiz, progress not updated"
                );
            }
        }

        tracing::info!(
            user_id = %result.user_id,
            quiz_id = %result.quiz_id,
            correct = result.is_correct,
            points = result.points_earned,
            "quiz result saved"
        );
        Ok(())
    }

    async fn get_quiz_results(
        &self,
        user_id: &str,
        quiz_id: Option<&str>,
    ) -> Result<Vec<QuizResult>> {
        let store = self.store.read().await;
        Ok(store
            .results
            .iter()
            .filter(|result| {
                result.user_id == user_id
                    && quiz_id.is_none_or(|quiz_id| result.quiz_id == quiz_id)
            })
            .cloned()
            .collect())
    }

    async fn get_quiz_progress(&self, user_id: &str) -> Result<Vec<QuizProgress>> {
        let store = self.store.read().await;
        let mut progress: Vec<QuizProgress> = store
            .progress
            .values()
            .filter(|progress| progress.user_id == user_id)
            .cloned()
            .collect();
        progress.sort_by_key(|progress| progress.level);
        Ok(progress)
    }

    async fn update_quiz_progress(&self, progress: &QuizProgress) -> Result<()> {
        let mut store = self.store.write().await;
        store
            .progress
            .insert((progress.user_id.clone(), progress.level), progress.clone());
        Ok(())
    }

    async fn get_wrong_answers(&self, user_id: &str) -> Result<Vec<WrongAnswer>> {
        let store = self.store.read().await;
        Ok(store
            .wrong_answers
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_to_wrong_answers(&self, user_id: &str, quiz_id: &str) -> Result<()> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        match store
            .wrong_answers
            .iter_mut()
            .find(|entry| entry.user_id == user_id && entry.quiz_id == quiz_id)
        {
            Some(entry) => {
                entry.miss_count += 1;
                entry.recorded_at = now;
            }
            None => store.wrong_answers.push(WrongAnswer {
                user_id: user_id.to_string(),
                quiz_id: quiz_id.to_string(),
                recorded_at: now,
                miss_count: 1,
            }),
        }
        Ok(())
    }

    async fn remove_from_wrong_answers(&self, user_id: &str, quiz_id: &str) -> Result<()> {
        let mut store = self.store.write().await;
        store
            .wrong_answers
            .retain(|entry| !(entry.user_id == user_id && entry.quiz_id == quiz_id));
        Ok(())
    }

    async fn get_review_quizzes(&self, user_id: &str) -> Result<Vec<Quiz>> {
        let entries = self.get_wrong_answers(user_id).await?;
        let mut quizzes = Vec::with_capacity(entries.len());
        for entry in entries {
            match self
                .get_quiz_by_id(&entry.quiz_id)
                .await
                .context("resolving wrong-answer ledger entry")?
            {
                Some(quiz) => quizzes.push(quiz),
                None => tracing::warn!(
                    quiz_id = %entry.quiz_id,
                    "ledger references missing quiz, skipping"
                ),
            }
        }
        Ok(quizzes)
    }

    async fn get_spaced_repetition_quizzes(&self, user_id: &str) -> Result<Vec<Quiz>> {
        let mut entries = self.get_wrong_answers(user_id).await?;
        // Most-missed first, oldest first among equals. Placeholder ordering
        // until a real interval scheduler lands.
        entries.sort_by(|a, b| {
            b.miss_count
                .cmp(&a.miss_count)
                .then(a.recorded_at.cmp(&b.recorded_at))
        });

        let mut quizzes = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(quiz) = self.get_quiz_by_id(&entry.quiz_id).await? {
                quizzes.push(quiz);
            }
        }
        Ok(quizzes)
    }
}
