//! Prompt templates for content generation and difficulty calibration.
//!
//! One template per question type, parameterized by skill, difficulty, and
//! language. Every template pins the exact JSON shape the decoder expects.

use quizsmith_shared::{CoverageKey, QuestionType};

/// Render the generation prompt for one coverage bucket.
pub fn render_generation_prompt(key: &CoverageKey, skill_title: &str) -> String {
    let language = language_name(&key.language);
    let type_label = type_label(key.question_type);
    let schema = schema_block(key.question_type);

    format!(
        "You are writing practice content for a tutoring platform.\n\
         Write one {type_label} question about \"{skill_title}\" at difficulty {difficulty} \
         on a 1-5 scale.\n\
         Write the question and all answer content in {language}.\n\n\
         Respond with exactly one JSON object in this shape and nothing else:\n{schema}",
        difficulty = key.difficulty,
    )
}

/// Render the calibration prompt: rate an existing question's difficulty.
pub fn render_calibration_prompt(question_text: &str) -> String {
    format!(
        "Rate the difficulty of the following practice question on a scale from 1 \
         (easiest) to 5 (hardest).\n\
         Respond with exactly one JSON object: {{\"difficulty\": N}}\n\n\
         Question:\n{question_text}"
    )
}

fn type_label(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::MultipleChoice => "multiple-choice",
        QuestionType::FillInBlank => "fill-in-the-blank",
        QuestionType::Matching => "matching",
        QuestionType::Ordering => "ordering",
        QuestionType::ShortAnswer => "short-answer",
        QuestionType::LongAnswer => "long-answer (extended response)",
    }
}

fn schema_block(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::MultipleChoice => {
            r#"{"prompt": "<question text>", "difficulty": <1-5>, "options": ["<a>", "<b>", "<c>", "<d>"], "answer": <index of the correct option, 0-3>, "explanation": "<why the answer is correct>"}
Use exactly 4 distinct options."#
        }
        QuestionType::FillInBlank => {
            r#"{"prompt": "<question text with each blank written as ___>", "difficulty": <1-5>, "blanks": ["<answer for blank 1>", "..."], "explanation": "<optional explanation>"}
Use ___ (three underscores) for every blank; provide one answer per blank, in order."#
        }
        QuestionType::Matching => {
            r#"{"prompt": "<instructions>", "difficulty": <1-5>, "left": ["<item>", "..."], "right": ["<item>", "..."], "correct_pairs": [[<left index>, <right index>], ...], "explanation": "<optional explanation>"}
Use at least 3 items per side, equal lengths, and pair every index exactly once."#
        }
        QuestionType::Ordering => {
            r#"{"prompt": "<instructions>", "difficulty": <1-5>, "items": ["<item>", "..."], "correct_order": [<index>, ...], "explanation": "<optional explanation>"}
Use at least 3 items; correct_order must list every item index exactly once."#
        }
        QuestionType::ShortAnswer | QuestionType::LongAnswer => {
            r#"{"prompt": "<question text>", "difficulty": <1-5>, "model_answer": "<a full correct answer>", "marking_scheme": {"total": <total points>, "criteria": [{"description": "<what earns the points>", "points": <points>}, ...]}}
Criterion points must be non-negative and sum to the total."#
        }
    }
}

/// Human-readable language name for a catalog language code.
/// Unknown codes fall through as-is; the backend copes.
fn language_name(code: &str) -> &str {
    match code {
        "en" => "English",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "pl" => "Polish",
        "tr" => "Turkish",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizsmith_shared::Difficulty;

    fn key(qt: QuestionType, language: &str) -> CoverageKey {
        CoverageKey {
            skill_node: "algebra-linear-equations".into(),
            difficulty: Difficulty::clamp(4),
            question_type: qt,
            language: language.into(),
        }
    }

    #[test]
    fn generation_prompt_names_skill_difficulty_language() {
        let prompt = render_generation_prompt(
            &key(QuestionType::MultipleChoice, "es"),
            "Linear Equations",
        );
        assert!(prompt.contains("Linear Equations"));
        assert!(prompt.contains("difficulty 4"));
        assert!(prompt.contains("Spanish"));
        assert!(prompt.contains("exactly one JSON object"));
        assert!(prompt.contains(r#""options""#));
    }

    #[test]
    fn each_type_gets_its_own_schema() {
        let mcq = render_generation_prompt(&key(QuestionType::MultipleChoice, "en"), "T");
        let fib = render_generation_prompt(&key(QuestionType::FillInBlank, "en"), "T");
        let matching = render_generation_prompt(&key(QuestionType::Matching, "en"), "T");
        let ordering = render_generation_prompt(&key(QuestionType::Ordering, "en"), "T");
        let written = render_generation_prompt(&key(QuestionType::ShortAnswer, "en"), "T");

        assert!(mcq.contains(r#""answer""#));
        assert!(fib.contains("___"));
        assert!(matching.contains(r#""correct_pairs""#));
        assert!(ordering.contains(r#""correct_order""#));
        assert!(written.contains(r#""marking_scheme""#));
    }

    #[test]
    fn unknown_language_passes_through() {
        let prompt = render_generation_prompt(&key(QuestionType::Ordering, "xx"), "T");
        assert!(prompt.contains("in xx"));
    }

    #[test]
    fn calibration_prompt_embeds_question() {
        let prompt = render_calibration_prompt("Solve x + 1 = 3.");
        assert!(prompt.contains("Solve x + 1 = 3."));
        assert!(prompt.contains(r#"{"difficulty": N}"#));
    }
}
