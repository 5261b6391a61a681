//! Request planning: turn a gap report into a bounded, ordered work list.

use serde::Serialize;
use tracing::{debug, instrument};

use quizsmith_shared::{CoverageKey, Difficulty, QuestionType};

use crate::gaps::GapReport;

/// Optional caller constraints narrowing a planning pass to part of the
/// catalog. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub skill_node: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub question_type: Option<QuestionType>,
    pub language: Option<String>,
}

impl PlanFilter {
    /// Whether a key satisfies every set constraint.
    pub fn matches(&self, key: &CoverageKey) -> bool {
        if let Some(skill) = &self.skill_node {
            if &key.skill_node != skill {
                return false;
            }
        }
        if let Some(difficulty) = self.difficulty {
            if key.difficulty != difficulty {
                return false;
            }
        }
        if let Some(question_type) = self.question_type {
            if key.question_type != question_type {
                return false;
            }
        }
        if let Some(language) = &self.language {
            if &key.language != language {
                return false;
            }
        }
        true
    }
}

/// A planned, bounded generation request for one coverage bucket.
/// Consumed exactly once by the generation stage per round.
#[derive(Debug, Clone, Serialize)]
pub struct WorkItem {
    pub key: CoverageKey,
    /// Items to request this run. Never exceeds the per-run cap, whatever
    /// the true deficit.
    pub requested: u32,
}

/// Plan a work list from a gap report.
///
/// Each entry's deficit is capped at `per_run_cap` to bound the cost of one
/// invocation, and `max_total` (when given) bounds the summed request count.
/// Items are grouped by skill node to exploit prompt/context locality; the
/// report's priority order is preserved within each node.
#[instrument(skip_all, fields(gaps = report.entries.len()))]
pub fn plan(
    report: &GapReport,
    filter: &PlanFilter,
    per_run_cap: u32,
    max_total: Option<u32>,
) -> Vec<WorkItem> {
    let mut items: Vec<WorkItem> = report
        .entries
        .iter()
        .filter(|entry| filter.matches(&entry.key))
        .map(|entry| WorkItem {
            key: entry.key.clone(),
            requested: entry.deficit.min(per_run_cap),
        })
        .collect();

    // Stable sort: skill-node grouping without disturbing priority order
    // within a node.
    items.sort_by(|a, b| a.key.skill_node.cmp(&b.key.skill_node));

    if let Some(cap) = max_total {
        let mut budget = cap;
        items.retain_mut(|item| {
            if budget == 0 {
                return false;
            }
            item.requested = item.requested.min(budget);
            budget -= item.requested;
            true
        });
    }

    debug!(
        work_items = items.len(),
        total_requested = items.iter().map(|i| u64::from(i.requested)).sum::<u64>(),
        "plan built"
    );

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gaps::GapEntry;

    fn entry(skill: &str, difficulty: i64, qt: QuestionType, deficit: u32) -> GapEntry {
        GapEntry {
            key: CoverageKey {
                skill_node: skill.into(),
                difficulty: Difficulty::clamp(difficulty),
                question_type: qt,
                language: "en".into(),
            },
            current: 0,
            target: deficit,
            deficit,
            priority: 10,
        }
    }

    fn report(entries: Vec<GapEntry>) -> GapReport {
        GapReport { entries }
    }

    #[test]
    fn requested_never_exceeds_per_run_cap() {
        let report = report(vec![entry("algebra", 3, QuestionType::MultipleChoice, 8)]);
        let items = plan(&report, &PlanFilter::default(), 2, None);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].requested, 2);
    }

    #[test]
    fn small_deficits_pass_through() {
        let report = report(vec![entry("algebra", 3, QuestionType::Ordering, 1)]);
        let items = plan(&report, &PlanFilter::default(), 5, None);
        assert_eq!(items[0].requested, 1);
    }

    #[test]
    fn filter_narrows_to_one_bucket() {
        let report = report(vec![
            entry("algebra", 3, QuestionType::MultipleChoice, 2),
            entry("algebra", 2, QuestionType::MultipleChoice, 2),
            entry("geometry", 3, QuestionType::Ordering, 2),
        ]);

        let filter = PlanFilter {
            skill_node: Some("algebra".into()),
            difficulty: Some(Difficulty::clamp(3)),
            ..Default::default()
        };
        let items = plan(&report, &filter, 5, None);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key.skill_node, "algebra");
        assert_eq!(items[0].key.difficulty, Difficulty::clamp(3));
    }

    #[test]
    fn groups_by_skill_node() {
        let report = report(vec![
            entry("geometry", 3, QuestionType::Matching, 2),
            entry("algebra", 3, QuestionType::Matching, 2),
            entry("geometry", 2, QuestionType::Matching, 2),
            entry("algebra", 2, QuestionType::Matching, 2),
        ]);

        let items = plan(&report, &PlanFilter::default(), 5, None);
        let skills: Vec<&str> = items.iter().map(|i| i.key.skill_node.as_str()).collect();
        assert_eq!(skills, vec!["algebra", "algebra", "geometry", "geometry"]);
        // Report order preserved within each node.
        assert_eq!(items[0].key.difficulty, Difficulty::clamp(3));
        assert_eq!(items[2].key.difficulty, Difficulty::clamp(3));
    }

    #[test]
    fn max_total_bounds_the_run() {
        let report = report(vec![
            entry("algebra", 3, QuestionType::MultipleChoice, 4),
            entry("algebra", 2, QuestionType::MultipleChoice, 4),
            entry("geometry", 3, QuestionType::MultipleChoice, 4),
        ]);

        let items = plan(&report, &PlanFilter::default(), 4, Some(6));
        let total: u32 = items.iter().map(|i| i.requested).sum();
        assert_eq!(total, 6);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].requested, 2); // trimmed to fit the budget
    }
}
