//! Core domain types for the Quizsmith content catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{QuizsmithError, Result};

/// Lowest difficulty in the catalog.
pub const MIN_DIFFICULTY: u8 = 1;
/// Highest difficulty in the catalog.
pub const MAX_DIFFICULTY: u8 = 5;

// ---------------------------------------------------------------------------
// ItemId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for content item identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Generate a new time-sortable item identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// QuestionType
// ---------------------------------------------------------------------------

/// The finite set of question formats the catalog tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    FillInBlank,
    Matching,
    Ordering,
    ShortAnswer,
    LongAnswer,
}

impl QuestionType {
    /// All question types, in catalog order.
    pub const ALL: [QuestionType; 6] = [
        Self::MultipleChoice,
        Self::FillInBlank,
        Self::Matching,
        Self::Ordering,
        Self::ShortAnswer,
        Self::LongAnswer,
    ];

    /// Stable string form used in storage rows and CLI flags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple_choice",
            Self::FillInBlank => "fill_in_blank",
            Self::Matching => "matching",
            Self::Ordering => "ordering",
            Self::ShortAnswer => "short_answer",
            Self::LongAnswer => "long_answer",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionType {
    type Err = QuizsmithError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "multiple_choice" => Ok(Self::MultipleChoice),
            "fill_in_blank" => Ok(Self::FillInBlank),
            "matching" => Ok(Self::Matching),
            "ordering" => Ok(Self::Ordering),
            "short_answer" => Ok(Self::ShortAnswer),
            "long_answer" => Ok(Self::LongAnswer),
            other => Err(QuizsmithError::validation(format!(
                "unknown question type '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// A difficulty level, always within `[1, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Difficulty(u8);

impl Difficulty {
    /// Clamp an arbitrary value into the valid range.
    pub fn clamp(raw: i64) -> Self {
        Self(raw.clamp(MIN_DIFFICULTY as i64, MAX_DIFFICULTY as i64) as u8)
    }

    /// All difficulty levels, ascending.
    pub fn all() -> impl Iterator<Item = Difficulty> {
        (MIN_DIFFICULTY..=MAX_DIFFICULTY).map(Difficulty)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Ok(Difficulty::clamp(raw))
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// CoverageKey
// ---------------------------------------------------------------------------

/// Composite key identifying one bucket of the content catalog.
///
/// Immutable; used for grouping and lookup only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoverageKey {
    /// Leaf topic in the curriculum taxonomy.
    pub skill_node: String,
    /// Difficulty level 1–5.
    pub difficulty: Difficulty,
    /// Question format.
    pub question_type: QuestionType,
    /// Content language code (e.g., `en`).
    pub language: String,
}

impl std::fmt::Display for CoverageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/d{}/{}/{}",
            self.skill_node, self.difficulty, self.question_type, self.language
        )
    }
}

// ---------------------------------------------------------------------------
// Candidate payloads
// ---------------------------------------------------------------------------

/// One criterion in a marking scheme for written answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkingCriterion {
    /// What the marker is looking for.
    pub description: String,
    /// Points awarded when met. Must be non-negative.
    pub points: i64,
}

/// Marking scheme for short/long answer questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkingScheme {
    /// Declared total; criterion points must sum to this.
    pub total: i64,
    pub criteria: Vec<MarkingCriterion>,
}

/// Payload for a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoicePayload {
    /// Exactly four distinct options.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub answer: usize,
    pub explanation: String,
}

/// Payload for a fill-in-the-blank question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillInBlankPayload {
    /// One expected answer per blank marker in the prompt.
    pub blanks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Payload for a matching question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingPayload {
    pub left: Vec<String>,
    pub right: Vec<String>,
    /// `(left_index, right_index)` pairs forming a bijection.
    pub correct_pairs: Vec<(usize, usize)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Payload for an ordering question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderingPayload {
    pub items: Vec<String>,
    /// Permutation of `0..items.len()` giving the correct sequence.
    pub correct_order: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Payload for short/long answer questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrittenPayload {
    pub model_answer: String,
    pub marking_scheme: MarkingScheme,
}

/// Type-specific payload of a question, tagged for storage round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    MultipleChoice(MultipleChoicePayload),
    FillInBlank(FillInBlankPayload),
    Matching(MatchingPayload),
    Ordering(OrderingPayload),
    ShortAnswer(WrittenPayload),
    LongAnswer(WrittenPayload),
}

impl Payload {
    /// The question type this payload belongs to.
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::MultipleChoice(_) => QuestionType::MultipleChoice,
            Self::FillInBlank(_) => QuestionType::FillInBlank,
            Self::Matching(_) => QuestionType::Matching,
            Self::Ordering(_) => QuestionType::Ordering,
            Self::ShortAnswer(_) => QuestionType::ShortAnswer,
            Self::LongAnswer(_) => QuestionType::LongAnswer,
        }
    }
}

// ---------------------------------------------------------------------------
// ContentCandidate
// ---------------------------------------------------------------------------

/// The generation backend's raw structured output for one item, decoded from
/// the single JSON object embedded in its free-text response.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentCandidate {
    /// Question text shown to the learner.
    pub prompt: String,
    /// Backend's own difficulty estimate, if it produced one.
    pub difficulty: Option<i64>,
    pub payload: Payload,
}

/// Fields common to every candidate object, regardless of question type.
#[derive(Debug, Deserialize)]
struct CandidateHeader {
    prompt: String,
    #[serde(default)]
    difficulty: Option<i64>,
}

impl ContentCandidate {
    /// Decode a candidate of a known question type from a raw JSON object.
    ///
    /// A shape mismatch (missing or mistyped fields) is malformed output, not
    /// a validation failure: the backend did not produce the object the
    /// prompt asked for.
    pub fn from_value(question_type: QuestionType, value: &serde_json::Value) -> Result<Self> {
        let header: CandidateHeader = serde_json::from_value(value.clone())
            .map_err(|e| QuizsmithError::malformed(format!("candidate object: {e}")))?;

        let payload = match question_type {
            QuestionType::MultipleChoice => Payload::MultipleChoice(decode(value)?),
            QuestionType::FillInBlank => Payload::FillInBlank(decode(value)?),
            QuestionType::Matching => Payload::Matching(decode(value)?),
            QuestionType::Ordering => Payload::Ordering(decode(value)?),
            QuestionType::ShortAnswer => Payload::ShortAnswer(decode(value)?),
            QuestionType::LongAnswer => Payload::LongAnswer(decode(value)?),
        };

        Ok(Self {
            prompt: header.prompt,
            difficulty: header.difficulty,
            payload,
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: &serde_json::Value) -> Result<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| QuizsmithError::malformed(format!("candidate payload: {e}")))
}

// ---------------------------------------------------------------------------
// ContentItem
// ---------------------------------------------------------------------------

/// Lifecycle status of a persisted content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Ready,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
        }
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = QuizsmithError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ready" => Ok(Self::Ready),
            other => Err(QuizsmithError::validation(format!(
                "unknown item status '{other}'"
            ))),
        }
    }
}

/// A validated, persisted unit of generated content.
///
/// Append-only: once written, never mutated or deleted by this pipeline.
/// Superseding content is added as a new row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// Globally unique identifier, assigned at write time.
    pub id: ItemId,
    /// Coverage key, denormalized onto the row for grouped counting.
    pub key: CoverageKey,
    /// Question text.
    pub prompt: String,
    /// Type-specific payload.
    pub payload: Payload,
    /// Model that produced this item.
    pub model_id: String,
    /// SHA-256 fingerprint of prompt + payload.
    pub content_hash: String,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
}

impl ContentItem {
    /// Build a persistable item from a validated candidate.
    ///
    /// Assigns a fresh id and fingerprint; the candidate's own difficulty
    /// estimate has already been folded into `key` by the validator.
    pub fn from_candidate(key: CoverageKey, candidate: &ContentCandidate, model_id: &str) -> Self {
        let content_hash = fingerprint(&candidate.prompt, &candidate.payload);
        Self {
            id: ItemId::new(),
            key,
            prompt: candidate.prompt.clone(),
            payload: candidate.payload.clone(),
            model_id: model_id.to_string(),
            content_hash,
            status: ItemStatus::Ready,
            created_at: Utc::now(),
        }
    }
}

/// SHA-256 fingerprint of a question's prompt and serialized payload.
pub fn fingerprint(prompt: &str, payload: &Payload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    if let Ok(json) = serde_json::to_string(payload) {
        hasher.update(json.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> CoverageKey {
        CoverageKey {
            skill_node: "algebra-linear-equations".into(),
            difficulty: Difficulty::clamp(3),
            question_type: QuestionType::MultipleChoice,
            language: "en".into(),
        }
    }

    #[test]
    fn item_id_roundtrip() {
        let id = ItemId::new();
        let s = id.to_string();
        let parsed: ItemId = s.parse().expect("parse ItemId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn difficulty_clamps_to_range() {
        assert_eq!(Difficulty::clamp(0).value(), 1);
        assert_eq!(Difficulty::clamp(3).value(), 3);
        assert_eq!(Difficulty::clamp(9).value(), 5);
        assert_eq!(Difficulty::clamp(-2).value(), 1);
    }

    #[test]
    fn difficulty_deserializes_with_clamp() {
        let d: Difficulty = serde_json::from_str("17").expect("deserialize");
        assert_eq!(d.value(), 5);
    }

    #[test]
    fn question_type_roundtrip() {
        for qt in QuestionType::ALL {
            let parsed: QuestionType = qt.as_str().parse().expect("parse question type");
            assert_eq!(parsed, qt);
        }
        assert!("essay".parse::<QuestionType>().is_err());
    }

    #[test]
    fn coverage_key_display() {
        let key = sample_key();
        assert_eq!(
            key.to_string(),
            "algebra-linear-equations/d3/multiple_choice/en"
        );
    }

    #[test]
    fn candidate_from_value_multiple_choice() {
        let value = serde_json::json!({
            "prompt": "What is 2 + 2?",
            "difficulty": 1,
            "options": ["3", "4", "5", "6"],
            "answer": 1,
            "explanation": "2 + 2 = 4."
        });

        let candidate =
            ContentCandidate::from_value(QuestionType::MultipleChoice, &value).expect("decode");
        assert_eq!(candidate.prompt, "What is 2 + 2?");
        assert_eq!(candidate.difficulty, Some(1));
        match &candidate.payload {
            Payload::MultipleChoice(mc) => {
                assert_eq!(mc.options.len(), 4);
                assert_eq!(mc.answer, 1);
            }
            other => panic!("expected multiple choice payload, got {other:?}"),
        }
    }

    #[test]
    fn candidate_from_value_missing_fields_is_malformed() {
        let value = serde_json::json!({
            "prompt": "What is 2 + 2?",
            "answer": 1
        });

        let err = ContentCandidate::from_value(QuestionType::MultipleChoice, &value)
            .expect_err("should fail");
        assert!(matches!(err, QuizsmithError::MalformedOutput { .. }));
    }

    #[test]
    fn payload_storage_roundtrip() {
        let payload = Payload::Ordering(OrderingPayload {
            items: vec!["first".into(), "second".into(), "third".into()],
            correct_order: vec![2, 0, 1],
            explanation: None,
        });

        let json = serde_json::to_string(&payload).expect("serialize");
        assert!(json.contains(r#""kind":"ordering"#));
        let parsed: Payload = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, payload);
        assert_eq!(parsed.question_type(), QuestionType::Ordering);
    }

    #[test]
    fn content_item_from_candidate() {
        let candidate = ContentCandidate {
            prompt: "What is 2 + 2?".into(),
            difficulty: Some(1),
            payload: Payload::MultipleChoice(MultipleChoicePayload {
                options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
                answer: 1,
                explanation: "2 + 2 = 4.".into(),
            }),
        };

        let item = ContentItem::from_candidate(sample_key(), &candidate, "kimi-k2");
        assert_eq!(item.key, sample_key());
        assert_eq!(item.model_id, "kimi-k2");
        assert_eq!(item.status, ItemStatus::Ready);
        assert_eq!(item.content_hash.len(), 64);

        // Same content fingerprints identically; ids stay unique.
        let again = ContentItem::from_candidate(sample_key(), &candidate, "kimi-k2");
        assert_eq!(item.content_hash, again.content_hash);
        assert_ne!(item.id, again.id);
    }
}
