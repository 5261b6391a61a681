//! Gap analysis: current store counts vs. catalog targets.
//!
//! Analysis reads a snapshot of grouped counts and produces an ephemeral
//! report; it never writes. Running it twice with no intervening writes
//! yields an identical report.

use serde::Serialize;
use tracing::{debug, instrument};

use quizsmith_shared::{CoverageKey, QuestionType, Result};
use quizsmith_storage::ContentStore;

use crate::CoverageModel;

/// One under-covered bucket.
#[derive(Debug, Clone, Serialize)]
pub struct GapEntry {
    pub key: CoverageKey,
    /// Items currently in the store for this key.
    pub current: u64,
    /// Configured target for every bucket.
    pub target: u32,
    /// `target - current`, floored at zero (entries with zero deficit are
    /// dropped from the report entirely).
    pub deficit: u32,
    /// Fill priority; higher ranks earlier.
    pub priority: u32,
}

/// Snapshot of all under-covered buckets, sorted by descending priority.
#[derive(Debug, Clone, Serialize)]
pub struct GapReport {
    pub entries: Vec<GapEntry>,
}

impl GapReport {
    /// Sum of all deficits.
    pub fn total_deficit(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.deficit)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute the gap report for the full catalog against current store counts.
///
/// Keys absent from the store count as zero. Read-only and idempotent with
/// respect to the store.
#[instrument(skip_all, fields(buckets = model.bucket_count()))]
pub async fn analyze(model: &CoverageModel, store: &dyn ContentStore) -> Result<GapReport> {
    let counts = store.count_by_key().await?;
    let target = model.target();

    let mut entries: Vec<GapEntry> = model
        .keys()
        .filter_map(|key| {
            let current = counts.get(&key).copied().unwrap_or(0);
            let deficit = u64::from(target).saturating_sub(current) as u32;
            if deficit == 0 {
                return None;
            }
            let priority = priority(&key);
            Some(GapEntry {
                key,
                current,
                target,
                deficit,
                priority,
            })
        })
        .collect();

    // Priority first; key string as a deterministic tie-break.
    entries.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.key.to_string().cmp(&b.key.to_string()))
    });

    debug!(
        gaps = entries.len(),
        total_deficit = entries.iter().map(|e| u64::from(e.deficit)).sum::<u64>(),
        "gap analysis complete"
    );

    Ok(GapReport { entries })
}

/// Rank a bucket for filling.
///
/// Mid-range difficulties serve the most learners, and the recently
/// introduced interactive formats (matching, ordering) plus fill-in-the-blank
/// have the thinnest back catalog, so both rank higher. Difficulty dominates.
fn priority(key: &CoverageKey) -> u32 {
    let difficulty_weight = match key.difficulty.value() {
        3 => 3,
        2 | 4 => 2,
        _ => 1,
    };
    let type_weight = match key.question_type {
        QuestionType::Matching | QuestionType::Ordering => 2,
        QuestionType::FillInBlank => 1,
        _ => 0,
    };
    difficulty_weight * 10 + type_weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizsmith_shared::{
        CatalogConfig, ContentCandidate, ContentItem, Difficulty, MultipleChoicePayload, Payload,
        SkillNodeEntry,
    };
    use quizsmith_storage::memory::MemoryStore;

    fn small_model(target: u32) -> CoverageModel {
        CoverageModel::new(&CatalogConfig {
            skill_nodes: vec![SkillNodeEntry {
                id: "algebra".into(),
                title: "Algebra".into(),
            }],
            languages: vec!["en".into()],
            target_per_bucket: target,
        })
        .unwrap()
    }

    fn item_for(key: &CoverageKey) -> ContentItem {
        let candidate = ContentCandidate {
            prompt: "Q".into(),
            difficulty: None,
            payload: Payload::MultipleChoice(MultipleChoicePayload {
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                answer: 0,
                explanation: "a".into(),
            }),
        };
        ContentItem::from_candidate(key.clone(), &candidate, "kimi-k2")
    }

    #[tokio::test]
    async fn empty_store_reports_full_deficit() {
        let model = small_model(2);
        let store = MemoryStore::new();

        let report = analyze(&model, &store).await.unwrap();
        // 1 skill × 5 difficulties × 6 types × 1 language, all empty
        assert_eq!(report.entries.len(), 30);
        assert_eq!(report.total_deficit(), 60);
        assert!(report.entries.iter().all(|e| e.current == 0 && e.deficit == 2));
    }

    #[tokio::test]
    async fn deficit_is_never_negative() {
        let model = small_model(1);
        let store = MemoryStore::new();

        // Overfill one bucket well past its target.
        let key = model.keys().next().unwrap();
        for _ in 0..5 {
            store.insert_item(&item_for(&key)).await.unwrap();
        }

        let report = analyze(&model, &store).await.unwrap();
        assert!(report.entries.iter().all(|e| e.key != key));
        assert!(report.entries.iter().all(|e| e.deficit > 0));
    }

    #[tokio::test]
    async fn partial_coverage_shrinks_deficit() {
        let model = small_model(3);
        let store = MemoryStore::new();

        let key = model.keys().next().unwrap();
        store.insert_item(&item_for(&key)).await.unwrap();

        let report = analyze(&model, &store).await.unwrap();
        let entry = report
            .entries
            .iter()
            .find(|e| e.key == key)
            .expect("still under target");
        assert_eq!(entry.current, 1);
        assert_eq!(entry.deficit, 2);
    }

    #[tokio::test]
    async fn analysis_is_idempotent() {
        let model = small_model(2);
        let store = MemoryStore::new();
        let key = model.keys().nth(3).unwrap();
        store.insert_item(&item_for(&key)).await.unwrap();

        let first = analyze(&model, &store).await.unwrap();
        let second = analyze(&model, &store).await.unwrap();

        assert_eq!(first.entries.len(), second.entries.len());
        for (a, b) in first.entries.iter().zip(second.entries.iter()) {
            assert_eq!(a.key, b.key);
            assert_eq!(a.current, b.current);
            assert_eq!(a.deficit, b.deficit);
            assert_eq!(a.priority, b.priority);
        }
    }

    #[tokio::test]
    async fn mid_difficulty_ranks_first() {
        let model = small_model(1);
        let store = MemoryStore::new();

        let report = analyze(&model, &store).await.unwrap();
        let first = &report.entries[0];
        assert_eq!(first.key.difficulty, Difficulty::clamp(3));
        // Within difficulty 3, the newer interactive formats lead.
        assert!(matches!(
            first.key.question_type,
            QuestionType::Matching | QuestionType::Ordering
        ));

        // Edge difficulties with classic formats land at the bottom.
        let last = report.entries.last().unwrap();
        assert_eq!(last.priority, 10);
    }
}
