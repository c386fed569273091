use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use regex::Regex;
use serde_json::Value;

/// Key-value cache with per-entry TTL and glob invalidation. Expiry is lazy:
/// a read past the deadline evicts the entry and reports a miss, no
/// background sweep required.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Removes every key matching the glob pattern (`*` wildcard). Returns
    /// the number of evicted entries.
    fn invalidate(&self, pattern: &str) -> usize;

    fn clear(&self);

    fn keys(&self) -> Vec<String>;

    /// Proactively purges expired entries. Returns how many were removed.
    fn cleanup(&self) -> usize;
}

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if now > deadline)
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.get(key) {
            Some(entry) => entry.is_expired(Instant::now()),
            None => return None,
        };
        if expired {
            entries.remove(key);
            tracing::debug!(key, "cache entry expired on read");
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let entry = CacheEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), entry);
    }

    fn invalidate(&self, pattern: &str) -> usize {
        let regex = match glob_to_regex(pattern) {
            Some(regex) => regex,
            None => {
                tracing::warn!(pattern, "unusable invalidation pattern, skipping");
                return 0;
            }
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|key, _| !regex.is_match(key));
        before - entries.len()
    }

    fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

/// Translates a `*` glob into an anchored regex; every other character is
/// matched literally.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 4);
    translated.push('^');
    for ch in pattern.chars() {
        if ch == '*' {
            translated.push_str(".*");
        } else {
            translated.push_str(&regex::escape(&ch.to_string()));
        }
    }
    translated.push('$');
    Regex::new(&translated).ok()
}
