//! Structured-object extraction from free-text generation responses.
//!
//! Generation backends wrap their JSON in commentary, Markdown code fences,
//! or both. This decoder scans the response for the first balanced,
//! parseable JSON object instead of trusting the whole body, and reports an
//! explicit error when no object can be found.

use quizsmith_shared::{QuizsmithError, Result};

/// Extract the first parseable JSON object embedded in `text`.
pub fn extract_json_object(text: &str) -> Result<serde_json::Value> {
    let bytes = text.as_bytes();

    for (start, _) in text.match_indices('{') {
        if let Some(end) = balanced_end(bytes, start) {
            let slice = &text[start..=end];
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(slice) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    Err(QuizsmithError::malformed(
        "no JSON object found in response",
    ))
}

/// Find the index of the brace closing the object opened at `start`,
/// skipping braces inside JSON string literals.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_object() {
        let value = extract_json_object(r#"{"prompt": "Q", "answer": 1}"#).expect("extract");
        assert_eq!(value["answer"], 1);
    }

    #[test]
    fn fenced_object() {
        let text = "Here is your question:\n```json\n{\"prompt\": \"Q\", \"answer\": 2}\n```\nLet me know if you need another!";
        let value = extract_json_object(text).expect("extract");
        assert_eq!(value["answer"], 2);
    }

    #[test]
    fn braces_inside_strings() {
        let text = r#"{"prompt": "What does {x} mean?", "explanation": "a } brace"}"#;
        let value = extract_json_object(text).expect("extract");
        assert_eq!(value["prompt"], "What does {x} mean?");
    }

    #[test]
    fn nested_objects() {
        let text = r#"Sure. {"prompt": "Q", "marking_scheme": {"total": 5, "criteria": []}}"#;
        let value = extract_json_object(text).expect("extract");
        assert_eq!(value["marking_scheme"]["total"], 5);
    }

    #[test]
    fn skips_unparseable_prefix() {
        // A stray opening brace before the real object must not defeat the scan.
        let text = r#"{oops not json} and then {"prompt": "Q"}"#;
        let value = extract_json_object(text).expect("extract");
        assert_eq!(value["prompt"], "Q");
    }

    #[test]
    fn no_object_is_an_error() {
        let err = extract_json_object("I could not generate a question, sorry.")
            .expect_err("should fail");
        assert!(matches!(
            err,
            QuizsmithError::MalformedOutput { .. }
        ));
    }

    #[test]
    fn unclosed_object_is_an_error() {
        let err = extract_json_object(r#"{"prompt": "Q""#).expect_err("should fail");
        assert!(matches!(err, QuizsmithError::MalformedOutput { .. }));
    }
}
