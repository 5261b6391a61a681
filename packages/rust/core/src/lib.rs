//! Pipeline orchestration for Quizsmith.
//!
//! This crate ties coverage analysis, planning, generation, validation, and
//! persistence into end-to-end workflows: one fill round ([`pipeline`]) and
//! the long-running scheduler loop ([`scheduler`]).

pub mod pipeline;
pub mod scheduler;
