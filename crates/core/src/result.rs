use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failed,
    NeedsClarification,
    Cancelled,
}

/// Terminal result of one automation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomationRunResult {
    pub outcome: RunOutcome,
    pub executed_steps: Vec<String>,
    pub generated_questions: Vec<String>,
    pub error_message: Option<String>,
    pub summary: Option<String>,
    /// Provider round trips made.
    pub turns: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AutomationRunResult {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }
}

/// Trim, drop empties, and remove case-insensitive duplicates keeping the
/// first occurrence.
pub fn dedupe_questions<I>(questions: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
        .collect()
}

/// Steps and questions gathered during a run; survives fatal errors.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub steps: Vec<String>,
    pub questions: Vec<String>,
    pub turns: u32,
}

impl RunState {
    pub fn record_step(&mut self, step: Option<String>) {
        if let Some(step) = step {
            self.steps.push(step);
        }
    }

    pub fn add_questions<I>(&mut self, questions: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.questions.extend(questions);
    }

    pub fn finish(
        self,
        outcome: RunOutcome,
        summary: Option<String>,
        error_message: Option<String>,
        started_at: DateTime<Utc>,
    ) -> AutomationRunResult {
        AutomationRunResult {
            outcome,
            executed_steps: self.steps,
            generated_questions: dedupe_questions(self.questions),
            error_message,
            summary,
            turns: self.turns,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_order_and_case() {
        let questions = dedupe_questions(
            ["Open which app?", "  open WHICH app? ", "", "Save first?"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(questions, vec!["Open which app?", "Save first?"]);
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        let value = serde_json::to_value(RunOutcome::NeedsClarification).unwrap();
        assert_eq!(value, "needs_clarification");
    }

    #[test]
    fn test_state_keeps_steps_on_failure() {
        let mut state = RunState::default();
        state.record_step(Some("Click at (1, 2)".into()));
        state.record_step(None);
        state.add_questions(vec!["Why?".to_string(), "why?".to_string()]);
        let result = state.finish(
            RunOutcome::Failed,
            None,
            Some("boom".into()),
            Utc::now(),
        );
        assert_eq!(result.executed_steps, vec!["Click at (1, 2)"]);
        assert_eq!(result.generated_questions, vec!["Why?"]);
        assert!(!result.is_success());
    }
}
