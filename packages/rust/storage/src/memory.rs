//! In-memory [`ContentStore`] for unit tests and dry experiments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use quizsmith_shared::{ContentItem, CoverageKey, ItemId, Result};

use crate::ContentStore;

/// A content store backed by a `Vec` behind a mutex.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<Vec<ContentItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Snapshot of all stored items, in insertion order.
    pub async fn all(&self) -> Vec<ContentItem> {
        self.items.lock().await.clone()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert_item(&self, item: &ContentItem) -> Result<()> {
        self.items.lock().await.push(item.clone());
        Ok(())
    }

    async fn get_item(&self, id: &ItemId) -> Result<Option<ContentItem>> {
        Ok(self
            .items
            .lock()
            .await
            .iter()
            .find(|item| &item.id == id)
            .cloned())
    }

    async fn count_by_key(&self) -> Result<HashMap<CoverageKey, u64>> {
        let items = self.items.lock().await;
        let mut counts: HashMap<CoverageKey, u64> = HashMap::new();
        for item in items.iter() {
            *counts.entry(item.key.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizsmith_shared::{
        ContentCandidate, Difficulty, MultipleChoicePayload, Payload, QuestionType,
    };

    fn sample_item(skill: &str) -> ContentItem {
        let key = CoverageKey {
            skill_node: skill.into(),
            difficulty: Difficulty::clamp(3),
            question_type: QuestionType::MultipleChoice,
            language: "en".into(),
        };
        let candidate = ContentCandidate {
            prompt: "Pick one.".into(),
            difficulty: None,
            payload: Payload::MultipleChoice(MultipleChoicePayload {
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                answer: 2,
                explanation: "c".into(),
            }),
        };
        ContentItem::from_candidate(key, &candidate, "kimi-k2")
    }

    #[tokio::test]
    async fn insert_get_count() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);

        let item = sample_item("algebra-linear-equations");
        store.insert_item(&item).await.unwrap();
        store
            .insert_item(&sample_item("algebra-linear-equations"))
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        let found = store.get_item(&item.id).await.unwrap().expect("some");
        assert_eq!(found.id, item.id);

        let counts = store.count_by_key().await.unwrap();
        assert_eq!(counts.get(&item.key), Some(&2));
    }
}
