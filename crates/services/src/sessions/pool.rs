use std::collections::HashSet;
use std::sync::Arc;

use exam_core::model::{CorrectnessIssue, ExamSet, Question, QuestionId};

use crate::error::SessionError;

/// The immutable question list a session draws from.
///
/// The pool is shared between restarts of the same session, so it holds its
/// questions behind an `Arc`.
#[derive(Debug, Clone)]
pub struct QuestionPool {
    questions: Arc<[Question]>,
    flagged: Vec<(QuestionId, CorrectnessIssue)>,
}

impl QuestionPool {
    /// Build a pool from a list of questions.
    ///
    /// Repeated question ids keep their first occurrence. Questions without
    /// exactly one correct choice are kept but flagged and logged.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyPool` if `questions` is empty.
    pub fn new(questions: Vec<Question>) -> Result<Self, SessionError> {
        let mut seen = HashSet::with_capacity(questions.len());
        let questions: Vec<Question> = questions
            .into_iter()
            .filter(|q| {
                let fresh = seen.insert(q.id().clone());
                if !fresh {
                    tracing::debug!(question_id = %q.id(), "dropping repeated question from pool");
                }
                fresh
            })
            .collect();

        if questions.is_empty() {
            return Err(SessionError::EmptyPool);
        }

        let flagged: Vec<_> = questions
            .iter()
            .filter_map(|q| q.correctness_issue().map(|issue| (q.id().clone(), issue)))
            .collect();
        for (id, issue) in &flagged {
            tracing::warn!(question_id = %id, ?issue, "question does not have exactly one correct choice");
        }

        Ok(Self {
            questions: questions.into(),
            flagged,
        })
    }

    /// Snapshot the questions of an exam set.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyPool` if the set has no questions.
    pub fn from_exam_set(set: &ExamSet) -> Result<Self, SessionError> {
        Self::new(set.questions().to_vec())
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Questions whose correct-choice count is not exactly one.
    #[must_use]
    pub fn flagged(&self) -> &[(QuestionId, CorrectnessIssue)] {
        &self.flagged
    }
}
