//! Candidate validation and normalization.
//!
//! Every candidate passes through [`normalize`] before it may become a
//! persisted content item. Checks are per question type; any violation
//! rejects the candidate with a validation error and the pipeline moves on
//! to the next item.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use quizsmith_shared::{
    ContentCandidate, CoverageKey, Difficulty, MarkingScheme, MatchingPayload, OrderingPayload,
    Payload, QuizsmithError, Result,
};

/// A run of 3+ underscores marks one blank in a fill-in-the-blank prompt.
static BLANK_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{3,}").expect("valid regex"));

/// Required option count for multiple-choice questions.
const MCQ_OPTIONS: usize = 4;

/// Minimum item count for matching and ordering questions.
const MIN_LIST_ITEMS: usize = 3;

/// Validate a candidate against its question type's schema rules and clamp
/// its difficulty into range.
///
/// Returns the normalized candidate: the backend's difficulty estimate is
/// clamped to `[1, 5]`, or replaced by the bucket's difficulty when the
/// backend produced none.
pub fn normalize(mut candidate: ContentCandidate, key: &CoverageKey) -> Result<ContentCandidate> {
    if candidate.prompt.trim().is_empty() {
        return Err(QuizsmithError::validation("prompt text is empty"));
    }

    if candidate.payload.question_type() != key.question_type {
        return Err(QuizsmithError::validation(format!(
            "payload is {} but the bucket expects {}",
            candidate.payload.question_type(),
            key.question_type
        )));
    }

    match &candidate.payload {
        Payload::MultipleChoice(mc) => {
            if mc.options.len() != MCQ_OPTIONS {
                return Err(QuizsmithError::validation(format!(
                    "expected {MCQ_OPTIONS} options, got {}",
                    mc.options.len()
                )));
            }
            let distinct: HashSet<&str> = mc.options.iter().map(|o| o.trim()).collect();
            if distinct.len() != mc.options.len() {
                return Err(QuizsmithError::validation("options are not distinct"));
            }
            if mc.answer >= mc.options.len() {
                return Err(QuizsmithError::validation(format!(
                    "answer index {} out of range",
                    mc.answer
                )));
            }
            if mc.explanation.trim().is_empty() {
                return Err(QuizsmithError::validation("explanation is empty"));
            }
        }
        Payload::FillInBlank(fib) => {
            if fib.blanks.is_empty() {
                return Err(QuizsmithError::validation("blanks list is empty"));
            }
            if fib.blanks.iter().any(|b| b.trim().is_empty()) {
                return Err(QuizsmithError::validation("blank answer is empty"));
            }
            let markers = BLANK_MARKER.find_iter(&candidate.prompt).count();
            if markers != fib.blanks.len() {
                return Err(QuizsmithError::validation(format!(
                    "prompt has {markers} blank markers but {} answers",
                    fib.blanks.len()
                )));
            }
        }
        Payload::Matching(matching) => check_matching(matching)?,
        Payload::Ordering(ordering) => check_ordering(ordering)?,
        Payload::ShortAnswer(written) | Payload::LongAnswer(written) => {
            if written.model_answer.trim().is_empty() {
                return Err(QuizsmithError::validation("model answer is empty"));
            }
            check_marking_scheme(&written.marking_scheme)?;
        }
    }

    let resolved = match candidate.difficulty {
        Some(raw) => Difficulty::clamp(raw),
        None => key.difficulty,
    };
    candidate.difficulty = Some(i64::from(resolved.value()));

    debug!(key = %key, difficulty = resolved.value(), "candidate accepted");
    Ok(candidate)
}

fn check_matching(matching: &MatchingPayload) -> Result<()> {
    let n = matching.left.len();
    if n != matching.right.len() {
        return Err(QuizsmithError::validation(format!(
            "left has {n} items but right has {}",
            matching.right.len()
        )));
    }
    if n < MIN_LIST_ITEMS {
        return Err(QuizsmithError::validation(format!(
            "need at least {MIN_LIST_ITEMS} pairs, got {n}"
        )));
    }
    if matching.correct_pairs.len() != n {
        return Err(QuizsmithError::validation(format!(
            "expected {n} pairs, got {}",
            matching.correct_pairs.len()
        )));
    }

    let mut left_seen = vec![false; n];
    let mut right_seen = vec![false; n];
    for &(l, r) in &matching.correct_pairs {
        if l >= n || r >= n {
            return Err(QuizsmithError::validation(format!(
                "pair ({l}, {r}) out of range"
            )));
        }
        if left_seen[l] || right_seen[r] {
            return Err(QuizsmithError::validation(
                "correct_pairs is not a bijection",
            ));
        }
        left_seen[l] = true;
        right_seen[r] = true;
    }
    Ok(())
}

fn check_ordering(ordering: &OrderingPayload) -> Result<()> {
    let n = ordering.items.len();
    if n < MIN_LIST_ITEMS {
        return Err(QuizsmithError::validation(format!(
            "need at least {MIN_LIST_ITEMS} items, got {n}"
        )));
    }
    if ordering.correct_order.len() != n {
        return Err(QuizsmithError::validation(format!(
            "correct_order has {} entries for {n} items",
            ordering.correct_order.len()
        )));
    }

    let mut seen = vec![false; n];
    for &index in &ordering.correct_order {
        if index >= n || seen[index] {
            return Err(QuizsmithError::validation(
                "correct_order is not a permutation",
            ));
        }
        seen[index] = true;
    }
    Ok(())
}

fn check_marking_scheme(scheme: &MarkingScheme) -> Result<()> {
    if scheme.criteria.iter().any(|c| c.points < 0) {
        return Err(QuizsmithError::validation(
            "marking criterion has negative points",
        ));
    }
    let sum: i64 = scheme.criteria.iter().map(|c| c.points).sum();
    if sum != scheme.total {
        return Err(QuizsmithError::validation(format!(
            "criterion points sum to {sum} but total is {}",
            scheme.total
        )));
    }
    Ok(())
}
