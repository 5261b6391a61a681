//! Shared types, error model, and configuration for Quizsmith.
//!
//! This crate is the foundation depended on by all other Quizsmith crates.
//! It provides:
//! - [`QuizsmithError`] — the unified error type
//! - Domain types ([`CoverageKey`], [`ContentCandidate`], [`ContentItem`], [`ItemId`])
//! - Configuration ([`AppConfig`], catalog/backend sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackendConfig, CatalogConfig, DB_PATH_ENV, DefaultsConfig, JobsConfig,
    SkillNodeEntry, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_api_key, resolve_db_path,
};
pub use error::{QuizsmithError, Result};
pub use types::{
    ContentCandidate, ContentItem, CoverageKey, Difficulty, FillInBlankPayload, ItemId,
    ItemStatus, MarkingCriterion, MarkingScheme, MatchingPayload, MultipleChoicePayload,
    OrderingPayload, Payload, QuestionType, WrittenPayload, fingerprint,
};
