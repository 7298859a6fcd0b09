use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::session::{QuestionOutcome, SessionMode};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReportError {
    #[error("cannot build a report from a session without outcomes")]
    EmptySession,
}

/// Final scored summary of a completed session.
///
/// Only `finalize` builds one; reports are written out but never read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    mode: SessionMode,
    outcomes: Vec<QuestionOutcome>,
    correct_count: usize,
    total_questions: usize,
    total_elapsed_secs: u64,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

impl SessionReport {
    /// Fold resolved outcomes into a report.
    ///
    /// Total elapsed time is the sum of the per-question values, not the span
    /// between `started_at` and `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::EmptySession` if `outcomes` is empty.
    pub fn finalize(
        outcomes: Vec<QuestionOutcome>,
        mode: SessionMode,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, ReportError> {
        if outcomes.is_empty() {
            return Err(ReportError::EmptySession);
        }

        let correct_count = outcomes.iter().filter(|o| o.is_correct()).count();
        let total_elapsed_secs = outcomes
            .iter()
            .map(|o| u64::from(o.elapsed_secs()))
            .sum();

        Ok(Self {
            mode,
            total_questions: outcomes.len(),
            outcomes,
            correct_count,
            total_elapsed_secs,
            started_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn outcomes(&self) -> &[QuestionOutcome] {
        &self.outcomes
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    #[must_use]
    pub fn total_elapsed_secs(&self) -> u64 {
        self.total_elapsed_secs
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Share of correct answers as a whole percentage, rounded half up.
    #[must_use]
    pub fn accuracy_percent(&self) -> u32 {
        let pct = (self.correct_count * 200 + self.total_questions)
            .checked_div(self.total_questions * 2)
            .unwrap_or(0);
        u32::try_from(pct).unwrap_or(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{ChoiceId, QuestionId};
    use crate::model::question::{Choice, Question};
    use crate::model::session::PreparedQuestion;
    use crate::time::fixed_now;

    fn outcome(id: &str, answer: Option<&str>, elapsed: u32) -> QuestionOutcome {
        let q = Question::new(
            QuestionId::new(id),
            "prompt",
            None,
            vec![
                Choice::new(ChoiceId::new("yes"), "A", "yes", true),
                Choice::new(ChoiceId::new("no"), "B", "no", false),
            ],
        )
        .unwrap();
        QuestionOutcome::resolve(
            PreparedQuestion::unshuffled(&q),
            answer.map(ChoiceId::new),
            elapsed,
        )
    }

    fn finalize(outcomes: Vec<QuestionOutcome>) -> Result<SessionReport, ReportError> {
        SessionReport::finalize(outcomes, SessionMode::Review, fixed_now(), fixed_now())
    }

    #[test]
    fn finalize_counts_and_sums() {
        let outcomes = vec![
            outcome("q1", Some("yes"), 5),
            outcome("q2", Some("no"), 7),
            outcome("q3", None, 30),
        ];
        let report = finalize(outcomes).unwrap();
        assert_eq!(report.correct_count(), 1);
        assert_eq!(report.total_questions(), 3);
        assert_eq!(report.total_elapsed_secs(), 42);
        assert_eq!(report.accuracy_percent(), 33);
    }

    #[test]
    fn elapsed_ignores_wall_clock_span() {
        let start = fixed_now();
        let end = start + chrono::Duration::hours(2);
        let report =
            SessionReport::finalize(vec![outcome("q1", None, 3)], SessionMode::Review, start, end)
                .unwrap();
        assert_eq!(report.total_elapsed_secs(), 3);
    }

    #[test]
    fn finalize_is_deterministic() {
        let outcomes = vec![outcome("q1", Some("yes"), 1), outcome("q2", Some("yes"), 2)];
        let a = finalize(outcomes.clone()).unwrap();
        let b = finalize(outcomes).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.accuracy_percent(), 100);
    }

    #[test]
    fn empty_session_is_an_error() {
        let err = finalize(Vec::new()).unwrap_err();
        assert_eq!(err, ReportError::EmptySession);
    }

    #[test]
    fn report_carries_mode_in_json() {
        let report = finalize(vec![outcome("q1", None, 3)]).unwrap();
        assert_eq!(report.mode(), SessionMode::Review);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["mode"], "review");
        assert_eq!(value["totalQuestions"], 1);
    }

    #[test]
    fn accuracy_of_an_empty_tally_is_zero() {
        let report = SessionReport {
            mode: SessionMode::Warmup,
            outcomes: Vec::new(),
            correct_count: 0,
            total_questions: 0,
            total_elapsed_secs: 0,
            started_at: fixed_now(),
            completed_at: fixed_now(),
        };
        assert_eq!(report.accuracy_percent(), 0);
    }

    #[test]
    fn accuracy_rounds_half_up() {
        let outcomes = vec![outcome("q1", Some("yes"), 0), outcome("q2", None, 0)];
        let half = finalize(outcomes).unwrap();
        assert_eq!(half.accuracy_percent(), 50);

        let outcomes = (0..8)
            .map(|i| outcome(&format!("q{i}"), (i < 5).then_some("yes"), 0))
            .collect();
        // 5/8 = 62.5%
        let report = finalize(outcomes).unwrap();
        assert_eq!(report.accuracy_percent(), 63);
    }
}
