//! Coverage model for the question catalog.
//!
//! The catalog's enumerable domains (skill nodes, difficulties 1–5, question
//! types, languages) come from loaded configuration, not compiled-in lists.
//! [`CoverageModel`] exposes their cartesian product — one [`CoverageKey`]
//! per bucket — and the target item count every bucket should reach.
//!
//! Downstream, [`gaps::analyze`] compares targets against store counts and
//! [`planner::plan`] turns the resulting deficits into a bounded work list.

pub mod gaps;
pub mod planner;

use quizsmith_shared::{
    CatalogConfig, CoverageKey, Difficulty, QuestionType, QuizsmithError, Result, SkillNodeEntry,
};

/// The configured key space of the content catalog.
#[derive(Debug, Clone)]
pub struct CoverageModel {
    skill_nodes: Vec<SkillNodeEntry>,
    languages: Vec<String>,
    target_per_bucket: u32,
}

impl CoverageModel {
    /// Build a model from catalog configuration.
    ///
    /// An empty skill or language list means there is nothing to cover, which
    /// is always a configuration mistake rather than a valid deployment.
    pub fn new(catalog: &CatalogConfig) -> Result<Self> {
        if catalog.skill_nodes.is_empty() {
            return Err(QuizsmithError::config(
                "catalog has no skill nodes; add [[catalog.skill_nodes]] entries to quizsmith.toml",
            ));
        }
        if catalog.languages.is_empty() {
            return Err(QuizsmithError::config("catalog has no languages"));
        }

        Ok(Self {
            skill_nodes: catalog.skill_nodes.clone(),
            languages: catalog.languages.clone(),
            target_per_bucket: catalog.target_per_bucket,
        })
    }

    /// Target item count per coverage bucket.
    pub fn target(&self) -> u32 {
        self.target_per_bucket
    }

    /// Total number of buckets in the catalog.
    pub fn bucket_count(&self) -> usize {
        self.skill_nodes.len()
            * (Difficulty::all().count())
            * QuestionType::ALL.len()
            * self.languages.len()
    }

    /// Human-readable title for a skill node, for prompt rendering.
    pub fn skill_title(&self, skill_node: &str) -> Option<&str> {
        self.skill_nodes
            .iter()
            .find(|n| n.id == skill_node)
            .map(|n| n.title.as_str())
    }

    /// Iterate the full cartesian product of the catalog's domains.
    pub fn keys(&self) -> impl Iterator<Item = CoverageKey> + '_ {
        self.skill_nodes.iter().flat_map(move |node| {
            Difficulty::all().flat_map(move |difficulty| {
                QuestionType::ALL.into_iter().flat_map(move |question_type| {
                    self.languages.iter().map(move |language| CoverageKey {
                        skill_node: node.id.clone(),
                        difficulty,
                        question_type,
                        language: language.clone(),
                    })
                })
            })
        })
    }
}
