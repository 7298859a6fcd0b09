use std::collections::HashMap;

use exam_core::model::{Question, QuestionId, QuestionProgress, SessionMode};

use super::pool::QuestionPool;

/// Decides which pool questions are eligible for a session in a given mode.
///
/// Strategies only filter; the sampler owns shuffling and truncation.
pub trait SelectionStrategy: Send + Sync {
    fn candidates<'p>(&self, mode: SessionMode, pool: &'p QuestionPool) -> Vec<&'p Question>;
}

/// Every question is a candidate regardless of mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl SelectionStrategy for PassThrough {
    fn candidates<'p>(&self, _mode: SessionMode, pool: &'p QuestionPool) -> Vec<&'p Question> {
        pool.questions().iter().collect()
    }
}

/// Filters by the user's attempt history:
///
/// - `Warmup`: questions never attempted
/// - `Review`: questions whose last attempt was wrong
/// - `Repetition`: questions whose last attempt was right
/// - `Comprehensive`: everything
#[derive(Debug, Clone, Default)]
pub struct ProgressStrategy {
    last_results: HashMap<QuestionId, bool>,
}

impl ProgressStrategy {
    #[must_use]
    pub fn new(history: impl IntoIterator<Item = QuestionProgress>) -> Self {
        let last_results = history
            .into_iter()
            .map(|p| (p.question_id, p.last_result))
            .collect();
        Self { last_results }
    }

    fn last_result(&self, id: &QuestionId) -> Option<bool> {
        self.last_results.get(id).copied()
    }
}

impl SelectionStrategy for ProgressStrategy {
    fn candidates<'p>(&self, mode: SessionMode, pool: &'p QuestionPool) -> Vec<&'p Question> {
        pool.questions()
            .iter()
            .filter(|q| match mode {
                SessionMode::Warmup => self.last_result(q.id()).is_none(),
                SessionMode::Review => self.last_result(q.id()) == Some(false),
                SessionMode::Repetition => self.last_result(q.id()) == Some(true),
                SessionMode::Comprehensive => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{Choice, ChoiceId, ExamSetId, UserId};
    use exam_core::time::fixed_now;

    fn pool() -> QuestionPool {
        let questions = ["fresh", "missed", "known"]
            .into_iter()
            .map(|id| {
                Question::new(
                    QuestionId::new(id),
                    "prompt",
                    None,
                    vec![
                        Choice::new(ChoiceId::new("a"), "A", "one", true),
                        Choice::new(ChoiceId::new("b"), "B", "two", false),
                    ],
                )
                .unwrap()
            })
            .collect();
        QuestionPool::new(questions).unwrap()
    }

    fn attempt(id: &str, is_correct: bool) -> QuestionProgress {
        QuestionProgress::first_attempt(
            UserId::new("u"),
            ExamSetId::new(1),
            QuestionId::new(id),
            is_correct,
            fixed_now(),
        )
    }

    fn ids(questions: &[&Question]) -> Vec<String> {
        questions.iter().map(|q| q.id().to_string()).collect()
    }

    #[test]
    fn pass_through_ignores_mode() {
        let pool = pool();
        for mode in SessionMode::ALL {
            assert_eq!(PassThrough.candidates(mode, &pool).len(), 3);
        }
    }

    #[test]
    fn progress_strategy_filters_by_last_result() {
        let pool = pool();
        let strategy = ProgressStrategy::new([attempt("missed", false), attempt("known", true)]);

        assert_eq!(ids(&strategy.candidates(SessionMode::Warmup, &pool)), ["fresh"]);
        assert_eq!(ids(&strategy.candidates(SessionMode::Review, &pool)), ["missed"]);
        assert_eq!(ids(&strategy.candidates(SessionMode::Repetition, &pool)), ["known"]);
        assert_eq!(strategy.candidates(SessionMode::Comprehensive, &pool).len(), 3);
    }
}
