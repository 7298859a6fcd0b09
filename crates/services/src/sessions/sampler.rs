use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;

use exam_core::model::{PreparedQuestion, SessionConfig};

use super::pool::QuestionPool;
use super::selection::{PassThrough, SelectionStrategy};
use crate::error::SessionError;

/// Draws the ordered question list for one session run.
#[derive(Clone)]
pub struct SessionSampler {
    strategy: Arc<dyn SelectionStrategy>,
}

impl Default for SessionSampler {
    fn default() -> Self {
        Self::new(Arc::new(PassThrough))
    }
}

impl SessionSampler {
    #[must_use]
    pub fn new(strategy: Arc<dyn SelectionStrategy>) -> Self {
        Self { strategy }
    }

    /// Draw `min(max_questions, candidates)` distinct questions in random
    /// order, each with its choices in an independent random order.
    ///
    /// The pool is not modified.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyPool` when the strategy leaves no
    /// candidates.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        pool: &QuestionPool,
        config: &SessionConfig,
        rng: &mut R,
    ) -> Result<Vec<PreparedQuestion>, SessionError> {
        let mut seen = HashSet::new();
        let mut candidates: Vec<_> = self
            .strategy
            .candidates(config.mode(), pool)
            .into_iter()
            .filter(|q| seen.insert(q.id()))
            .collect();
        if candidates.is_empty() {
            return Err(SessionError::EmptyPool);
        }

        let take = usize::try_from(config.max_questions())
            .unwrap_or(usize::MAX)
            .min(candidates.len());
        candidates.shuffle(rng);
        candidates.truncate(take);

        let prepared = candidates
            .into_iter()
            .map(|q| {
                let mut order: Vec<usize> = (0..q.choices().len()).collect();
                order.shuffle(rng);
                PreparedQuestion::with_order(q, &order)
            })
            .collect();
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{Choice, ChoiceId, Question, QuestionId, SessionMode};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pool(n: usize) -> QuestionPool {
        let questions = (0..n)
            .map(|i| {
                Question::new(
                    QuestionId::new(format!("q{i}")),
                    format!("prompt {i}"),
                    None,
                    vec![
                        Choice::new(ChoiceId::new("a"), "A", "one", false),
                        Choice::new(ChoiceId::new("b"), "B", "two", true),
                        Choice::new(ChoiceId::new("c"), "C", "three", false),
                        Choice::new(ChoiceId::new("d"), "D", "four", false),
                    ],
                )
                .unwrap()
            })
            .collect();
        QuestionPool::new(questions).unwrap()
    }

    fn config(max: u32) -> SessionConfig {
        SessionConfig::new(SessionMode::Comprehensive, max, 30).unwrap()
    }

    #[test]
    fn draws_min_of_limit_and_pool_without_repeats() {
        let pool = pool(5);
        let sampler = SessionSampler::default();
        let mut rng = StdRng::seed_from_u64(7);

        for (max, expected) in [(3, 3), (5, 5), (12, 5), (1, 1)] {
            let drawn = sampler.sample(&pool, &config(max), &mut rng).unwrap();
            assert_eq!(drawn.len(), expected);
            let unique: HashSet<_> = drawn.iter().map(|p| p.id().clone()).collect();
            assert_eq!(unique.len(), expected);
        }
    }

    #[test]
    fn shuffled_choices_keep_the_correct_answer() {
        let pool = pool(6);
        let drawn = SessionSampler::default()
            .sample(&pool, &config(6), &mut StdRng::seed_from_u64(11))
            .unwrap();

        for prepared in &drawn {
            assert_eq!(prepared.choices().len(), 4);
            let correct: Vec<_> = prepared.choices().iter().filter(|c| c.is_correct()).collect();
            assert_eq!(correct.len(), 1);
            assert_eq!(correct[0].id().as_str(), "b");
            assert_eq!(correct[0].text(), "two");
        }
    }

    #[test]
    fn same_seed_same_draw() {
        let pool = pool(8);
        let sampler = SessionSampler::default();
        let a = sampler.sample(&pool, &config(4), &mut StdRng::seed_from_u64(42)).unwrap();
        let b = sampler.sample(&pool, &config(4), &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sampling_leaves_pool_untouched() {
        let pool = pool(4);
        let before: Vec<_> = pool.questions().to_vec();
        SessionSampler::default()
            .sample(&pool, &config(4), &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(pool.questions(), before.as_slice());
    }

    struct Nothing;

    impl SelectionStrategy for Nothing {
        fn candidates<'p>(
            &self,
            _mode: SessionMode,
            _pool: &'p QuestionPool,
        ) -> Vec<&'p Question> {
            Vec::new()
        }
    }

    #[test]
    fn empty_selection_is_empty_pool() {
        let sampler = SessionSampler::new(Arc::new(Nothing));
        let err = sampler
            .sample(&pool(3), &config(3), &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, SessionError::EmptyPool));
    }
}
