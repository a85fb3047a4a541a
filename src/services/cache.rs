// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Short-lived cache for list responses.

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cached JSON response bodies keyed by caller and request URL.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, (Instant, Value)>>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            max_entries,
        }
    }

    pub fn key(user_id: i64, url: &str) -> String {
        format!("{}:{}", user_id, url)
    }

    /// Fresh cached body for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Value> {
        let hit = self.entries.get(key).and_then(|entry| {
            let (stored_at, body) = entry.value();
            (stored_at.elapsed() < self.ttl).then(|| body.clone())
        });
        if hit.is_none() {
            self.entries
                .remove_if(key, |_, (stored_at, _)| stored_at.elapsed() >= self.ttl);
        }
        hit
    }

    pub fn insert(&self, key: String, body: Value) {
        if self.entries.len() >= self.max_entries {
            let ttl = self.ttl;
            self.entries
                .retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        }
        if self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().0)
                .map(|entry| entry.key().clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, (Instant::now(), body));
    }

    /// Drop every cached response.
    pub fn invalidate(&self) {
        let dropped = self.entries.len();
        self.entries.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "Invalidated response cache");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_after_insert() {
        let cache = ResponseCache::new(Duration::from_secs(60), 10);
        let key = ResponseCache::key(3, "/api/donations/?status=pending");
        cache.insert(key.clone(), json!({"count": 1}));
        assert_eq!(cache.get(&key), Some(json!({"count": 1})));
        assert_eq!(cache.get(&ResponseCache::key(4, "/api/donations/?status=pending")), None);
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = ResponseCache::new(Duration::ZERO, 10);
        cache.insert("k".to_string(), json!(1));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        cache.insert("a".to_string(), json!(1));
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("b".to_string(), json!(2));
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("c".to_string(), json!(3));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some(json!(3)));
    }

    #[test]
    fn test_invalidate() {
        let cache = ResponseCache::new(Duration::from_secs(60), 10);
        cache.insert("a".to_string(), json!(1));
        cache.invalidate();
        assert!(cache.is_empty());
    }
}
