//! Extraction of the final completion payload from free text.

use crate::result::{dedupe_questions, RunOutcome};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Parsed end-of-run report.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub outcome: RunOutcome,
    pub summary: Option<String>,
    pub error_message: Option<String>,
    pub questions: Vec<String>,
}

pub const UNPARSEABLE_COMPLETION_ERROR: &str = "Completion payload could not be parsed";
pub const UNPARSEABLE_COMPLETION_QUESTION: &str =
    "The assistant finished without a clear result. Was the task completed, or what should happen next?";

#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionParser;

impl CompletionParser {
    pub fn parse(text: &str) -> Completion {
        match candidates(text).find_map(|candidate| payload(&candidate)) {
            Some(object) => from_payload(&object, text),
            None => {
                warn!("Completion text is not a status payload");
                Completion {
                    outcome: RunOutcome::NeedsClarification,
                    summary: non_empty(text.trim()),
                    error_message: Some(UNPARSEABLE_COMPLETION_ERROR.to_string()),
                    questions: vec![UNPARSEABLE_COMPLETION_QUESTION.to_string()],
                }
            }
        }
    }
}

/// Whole text, then a ```json fence, then the outermost braces.
fn candidates(text: &str) -> impl Iterator<Item = String> + '_ {
    let trimmed = text.trim();
    let fenced = fenced_json(trimmed);
    let braces = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(trimmed[start..=end].to_string()),
        _ => None,
    };
    std::iter::once(trimmed.to_string())
        .chain(fenced)
        .chain(braces)
}

fn fenced_json(text: &str) -> Option<String> {
    let lowered = text.to_ascii_lowercase();
    let open = lowered.find("```json")?;
    let body_start = open + "```json".len();
    let body_len = lowered[body_start..].find("```")?;
    Some(text[body_start..body_start + body_len].trim().to_string())
}

/// A JSON object carrying a string `status`.
fn payload(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) if map.get("status").is_some_and(Value::is_string) => Some(map),
        _ => None,
    }
}

fn from_payload(object: &Map<String, Value>, raw: &str) -> Completion {
    let status = object
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_ascii_uppercase();
    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .and_then(|s| non_empty(s.trim()));
    let error = object
        .get("error")
        .and_then(Value::as_str)
        .and_then(|s| non_empty(s.trim()));
    let questions = dedupe_questions(
        object
            .get("questions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string),
    );

    debug!("Completion status: {}", status);
    match status.as_str() {
        "SUCCESS" => Completion {
            outcome: RunOutcome::Success,
            summary,
            error_message: None,
            questions,
        },
        "FAILED" => Completion {
            outcome: RunOutcome::Failed,
            error_message: error.clone().or_else(|| summary.clone()),
            summary,
            questions,
        },
        _ => Completion {
            outcome: RunOutcome::NeedsClarification,
            summary: summary.or_else(|| non_empty(raw.trim())),
            error_message: error,
            questions: if questions.is_empty() {
                vec![UNPARSEABLE_COMPLETION_QUESTION.to_string()]
            } else {
                questions
            },
        },
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_success() {
        let c = CompletionParser::parse(r#"{"status":"SUCCESS","summary":"done"}"#);
        assert_eq!(c.outcome, RunOutcome::Success);
        assert_eq!(c.summary.as_deref(), Some("done"));
        assert!(c.error_message.is_none());
        assert!(c.questions.is_empty());
    }

    #[test]
    fn test_not_json() {
        let c = CompletionParser::parse("not json");
        assert_eq!(c.outcome, RunOutcome::NeedsClarification);
        assert_eq!(c.questions.len(), 1);
        assert!(c.error_message.is_some());
        assert_eq!(c.summary.as_deref(), Some("not json"));
    }

    #[test]
    fn test_fenced_matches_plain() {
        let plain = CompletionParser::parse(r#"{"status":"SUCCESS","summary":"done"}"#);
        let fenced = CompletionParser::parse(
            "All finished.\n```json\n{\"status\":\"SUCCESS\",\"summary\":\"done\"}\n```\n",
        );
        assert_eq!(plain, fenced);
    }

    #[test]
    fn test_braces_fallback() {
        let c = CompletionParser::parse(
            r#"Result: {"status":"FAILED","error":"app missing"} sorry"#,
        );
        assert_eq!(c.outcome, RunOutcome::Failed);
        assert_eq!(c.error_message.as_deref(), Some("app missing"));
    }

    #[test]
    fn test_object_without_status_is_skipped() {
        let c = CompletionParser::parse(r#"{"summary":"done"}"#);
        assert_eq!(c.outcome, RunOutcome::NeedsClarification);
        assert!(c.error_message.is_some());
    }

    #[test]
    fn test_other_status_keeps_questions_deduped() {
        let c = CompletionParser::parse(
            r#"{"status":"NEEDS_CLARIFICATION","questions":[" Which file? ","which FILE?","Where?"]}"#,
        );
        assert_eq!(c.outcome, RunOutcome::NeedsClarification);
        assert_eq!(c.questions, vec!["Which file?", "Where?"]);
        assert!(c.error_message.is_none());
    }
}
