use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Answer cache keyed by a hash of the raw query text.
pub struct AnswerCache {
    answers: Arc<DashMap<String, String>>,
    max_entries: usize,
}

impl AnswerCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            answers: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    pub fn get(&self, query: &str) -> Option<String> {
        self.answers.get(&hash_text(query)).map(|r| r.value().clone())
    }

    pub fn set(&self, query: &str, answer: String) {
        if self.answers.len() >= self.max_entries {
            // Simple eviction: drop a quarter of the entries when full
            let to_remove: Vec<_> = self
                .answers
                .iter()
                .take(self.max_entries / 4)
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.answers.remove(&key);
            }
        }
        self.answers.insert(hash_text(query), answer);
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_answers() {
        let cache = AnswerCache::new(10);
        assert!(cache.get("q").is_none());
        cache.set("q", "a".to_string());
        assert_eq!(cache.get("q").as_deref(), Some("a"));
    }

    #[test]
    fn eviction_keeps_the_cache_bounded() {
        let cache = AnswerCache::new(8);
        for i in 0..20 {
            cache.set(&format!("q{i}"), "a".to_string());
        }
        assert!(cache.len() <= 8);
    }
}
