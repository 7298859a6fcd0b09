use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use exam_core::model::{
    ChoiceId, PreparedQuestion, QuestionOutcome, SessionConfig, SessionId, SessionReport,
};
use exam_core::time::Clock;

use super::countdown::{SessionClock, Tick};
use super::pool::QuestionPool;
use super::progress::SessionProgress;
use super::sampler::SessionSampler;
use crate::error::SessionError;

//
// ─── STATES & SIGNALS ──────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionPhase {
    /// Waiting for an answer, a skip, or the countdown.
    Pending,
    /// An outcome is recorded; waiting for `advance`.
    Answered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    InProgress { index: usize, phase: QuestionPhase },
    Completed,
    Disposed,
}

impl SessionState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::InProgress {
                phase: QuestionPhase::Pending,
                ..
            } => "awaiting an answer",
            SessionState::InProgress {
                phase: QuestionPhase::Answered,
                ..
            } => "showing an answered question",
            SessionState::Completed => "completed",
            SessionState::Disposed => "disposed",
        }
    }
}

/// Result of `submit_answer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    Recorded { is_correct: bool },
    /// The current question already has an outcome; nothing changed.
    AlreadyAnswered,
    /// The session was disposed; nothing changed.
    Inert,
}

/// Result of `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    Next { index: usize },
    /// The last question was answered. The report is handed over exactly once.
    Completed(SessionReport),
    Inert,
}

//
// ─── MACHINE ───────────────────────────────────────────────────────────────────
//

/// Drives one practice session: draw, present, time, score, report.
///
/// The machine is synchronous and owns no tasks. Callers feed it answers and
/// one-second ticks from whatever event loop they run.
pub struct SessionStateMachine {
    id: SessionId,
    pool: QuestionPool,
    config: SessionConfig,
    sampler: SessionSampler,
    rng: StdRng,
    clock: Clock,
    countdown: SessionClock,
    questions: Vec<PreparedQuestion>,
    outcomes: Vec<QuestionOutcome>,
    state: SessionState,
    started_at: DateTime<Utc>,
}

impl SessionStateMachine {
    /// A session in `Loading`, drawing with the pass-through sampler from
    /// OS entropy and reading the system clock.
    #[must_use]
    pub fn new(pool: QuestionPool, config: SessionConfig) -> Self {
        let clock = Clock::default();
        let now = clock.now();
        Self {
            id: SessionId::generate(),
            pool,
            config,
            sampler: SessionSampler::default(),
            rng: StdRng::from_os_rng(),
            clock,
            countdown: SessionClock::started(0, now),
            questions: Vec::new(),
            outcomes: Vec::new(),
            state: SessionState::Loading,
            started_at: now,
        }
    }

    #[must_use]
    pub fn with_sampler(mut self, sampler: SessionSampler) -> Self {
        self.sampler = sampler;
        self
    }

    /// Replace the entropy source so draws are reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Draw the questions and present the first one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` outside `Loading` and
    /// `SessionError::EmptyPool` if nothing can be drawn.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Loading => self.run_fresh_draw(),
            SessionState::Disposed => Ok(()),
            state => Err(invalid("begin", state)),
        }
    }

    /// Record an answer for the current question. `None` is a skip.
    ///
    /// The first submission per question wins.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` while loading or completed.
    pub fn submit_answer(&mut self, choice: Option<ChoiceId>) -> Result<Commit, SessionError> {
        match self.state {
            SessionState::Disposed => Ok(Commit::Inert),
            SessionState::InProgress {
                phase: QuestionPhase::Answered,
                ..
            } => Ok(Commit::AlreadyAnswered),
            SessionState::InProgress {
                index,
                phase: QuestionPhase::Pending,
            } => self.commit(index, choice),
            state => Err(invalid("submit an answer", state)),
        }
    }

    /// Advance the current countdown by one second.
    ///
    /// When it runs out the question is resolved as if `None` had been
    /// submitted. Ticks outside a pending question are ignored.
    pub fn tick(&mut self) -> Tick {
        let SessionState::InProgress {
            index,
            phase: QuestionPhase::Pending,
        } = self.state
        else {
            return Tick::Idle;
        };

        let tick = self.countdown.tick();
        if tick == Tick::Expired {
            tracing::debug!(session_id = %self.id, index, "question timed out");
            if let Err(err) = self.commit(index, None) {
                tracing::warn!(session_id = %self.id, error = %err, "failed to record timeout");
            }
        }
        tick
    }

    /// Move past an answered question, or finish the session after the last.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the current question is
    /// answered.
    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        match self.state {
            SessionState::Disposed => Ok(Advance::Inert),
            SessionState::InProgress {
                index,
                phase: QuestionPhase::Answered,
            } => {
                let next = index + 1;
                if next < self.questions.len() {
                    self.present(next);
                    Ok(Advance::Next { index: next })
                } else {
                    self.finish().map(Advance::Completed)
                }
            }
            state => Err(invalid("advance", state)),
        }
    }

    /// Start over with a fresh draw from the same pool and config.
    ///
    /// Nothing carries over from the previous run except the pool.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is completed.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Completed => {
                self.id = SessionId::generate();
                self.run_fresh_draw()
            }
            SessionState::Disposed => Ok(()),
            state => Err(invalid("restart", state)),
        }
    }

    /// Stop the countdown and make every later call a no-op.
    pub fn dispose(&mut self) {
        if self.state == SessionState::Disposed {
            return;
        }
        self.countdown.dispose();
        self.state = SessionState::Disposed;
        tracing::debug!(session_id = %self.id, "session disposed");
    }

    // ─── Accessors ────────────────────────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn pool(&self) -> &QuestionPool {
        &self.pool
    }

    #[must_use]
    pub fn questions(&self) -> &[PreparedQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            SessionState::InProgress { index, .. } => Some(index),
            _ => None,
        }
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&PreparedQuestion> {
        self.current_index().and_then(|i| self.questions.get(i))
    }

    /// Outcomes recorded so far in this run.
    #[must_use]
    pub fn outcomes(&self) -> &[QuestionOutcome] {
        &self.outcomes
    }

    /// Outcome of the most recently resolved question, for feedback display.
    #[must_use]
    pub fn last_outcome(&self) -> Option<&QuestionOutcome> {
        self.outcomes.last()
    }

    #[must_use]
    pub fn time_remaining(&self) -> Option<u32> {
        match self.state {
            SessionState::InProgress { .. } => self.countdown.remaining(),
            _ => None,
        }
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.questions.len();
        let answered = self.outcomes.len();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            current_index: self.current_index(),
            time_remaining: self.time_remaining(),
            is_complete: self.state == SessionState::Completed,
        }
    }

    // ─── Internals ────────────────────────────────────────────────────────────

    fn run_fresh_draw(&mut self) -> Result<(), SessionError> {
        let questions = self.sampler.sample(&self.pool, &self.config, &mut self.rng)?;
        self.questions = questions;
        self.outcomes = Vec::with_capacity(self.questions.len());
        self.started_at = self.clock.now();
        tracing::info!(
            session_id = %self.id,
            mode = %self.config.mode(),
            questions = self.questions.len(),
            pool = self.pool.len(),
            time_limit_secs = self.config.time_limit_secs(),
            "session started"
        );
        self.present(0);
        Ok(())
    }

    fn present(&mut self, index: usize) {
        self.countdown
            .start(self.config.time_limit_secs(), self.clock.now());
        self.state = SessionState::InProgress {
            index,
            phase: QuestionPhase::Pending,
        };
        tracing::debug!(session_id = %self.id, index, "presenting question");
    }

    fn commit(&mut self, index: usize, choice: Option<ChoiceId>) -> Result<Commit, SessionError> {
        let Some(question) = self.questions.get(index).cloned() else {
            return Err(invalid("submit an answer", self.state));
        };
        let elapsed = self.countdown.stop(self.clock.now());
        let outcome = QuestionOutcome::resolve(question, choice, elapsed);
        let is_correct = outcome.is_correct();
        tracing::debug!(
            session_id = %self.id,
            index,
            question_id = %outcome.question_id(),
            is_correct,
            skipped = outcome.is_skipped(),
            elapsed_secs = elapsed,
            "answer recorded"
        );
        self.outcomes.push(outcome);
        self.state = SessionState::InProgress {
            index,
            phase: QuestionPhase::Answered,
        };
        Ok(Commit::Recorded { is_correct })
    }

    fn finish(&mut self) -> Result<SessionReport, SessionError> {
        let outcomes = std::mem::take(&mut self.outcomes);
        let report = SessionReport::finalize(
            outcomes,
            self.config.mode(),
            self.started_at,
            self.clock.now(),
        )?;
        self.state = SessionState::Completed;
        tracing::info!(
            session_id = %self.id,
            correct = report.correct_count(),
            total = report.total_questions(),
            elapsed_secs = report.total_elapsed_secs(),
            "session completed"
        );
        Ok(report)
    }
}

fn invalid(operation: &'static str, state: SessionState) -> SessionError {
    SessionError::InvalidState {
        operation,
        state: state.name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{Choice, Question, QuestionId, SessionMode};
    use exam_core::time::fixed_clock;
    use std::collections::HashSet;

    fn question(i: usize) -> Question {
        Question::new(
            QuestionId::new(format!("q{i}")),
            format!("Question {i}"),
            None,
            vec![
                Choice::new(ChoiceId::new("right"), "A", "right", true),
                Choice::new(ChoiceId::new("wrong"), "B", "wrong", false),
                Choice::new(ChoiceId::new("other"), "C", "other", false),
            ],
        )
        .unwrap()
    }

    fn pool(n: usize) -> QuestionPool {
        QuestionPool::new((0..n).map(question).collect()).unwrap()
    }

    fn machine(n: usize, max: u32, limit: u32) -> SessionStateMachine {
        let config = SessionConfig::new(SessionMode::Warmup, max, limit).unwrap();
        SessionStateMachine::new(pool(n), config)
            .with_seed(9)
            .with_clock(fixed_clock())
    }

    fn started(n: usize, max: u32, limit: u32) -> SessionStateMachine {
        let mut m = machine(n, max, limit);
        m.begin().unwrap();
        m
    }

    fn right() -> Option<ChoiceId> {
        Some(ChoiceId::new("right"))
    }

    fn run_to_report(m: &mut SessionStateMachine, answers: &[Option<ChoiceId>]) -> SessionReport {
        for (i, answer) in answers.iter().enumerate() {
            m.submit_answer(answer.clone()).unwrap();
            match m.advance().unwrap() {
                Advance::Next { index } => assert_eq!(index, i + 1),
                Advance::Completed(report) => return report,
                Advance::Inert => panic!("unexpected inert advance"),
            }
        }
        panic!("session did not complete");
    }

    #[test]
    fn begin_presents_first_question() {
        let m = started(5, 3, 30);
        assert_eq!(
            m.state(),
            SessionState::InProgress {
                index: 0,
                phase: QuestionPhase::Pending
            }
        );
        assert_eq!(m.questions().len(), 3);
        assert_eq!(m.time_remaining(), Some(30));
        assert!(m.current_question().is_some());
    }

    #[test]
    fn draws_are_bounded_and_distinct() {
        for (n, max) in [(5, 3), (2, 10), (4, 4)] {
            let m = started(n, max, 0);
            let expected = (max as usize).min(n);
            let ids: HashSet<_> = m.questions().iter().map(|q| q.id().clone()).collect();
            assert_eq!(m.questions().len(), expected);
            assert_eq!(ids.len(), expected);
        }
    }

    #[test]
    fn first_submission_wins() {
        let mut m = started(3, 3, 30);
        assert_eq!(
            m.submit_answer(right()).unwrap(),
            Commit::Recorded { is_correct: true }
        );
        assert_eq!(
            m.submit_answer(Some(ChoiceId::new("wrong"))).unwrap(),
            Commit::AlreadyAnswered
        );
        assert_eq!(m.outcomes().len(), 1);
        assert!(m.last_outcome().unwrap().is_correct());
        assert_eq!(m.tick(), Tick::Idle);
    }

    #[test]
    fn expiry_is_a_skip_with_full_time() {
        let mut m = started(2, 1, 10);
        for expected in (1..10).rev() {
            assert_eq!(m.tick(), Tick::Remaining(expected));
        }
        assert_eq!(m.tick(), Tick::Expired);

        let outcome = m.last_outcome().unwrap();
        assert!(outcome.is_skipped());
        assert!(!outcome.is_correct());
        assert_eq!(outcome.elapsed_secs(), 10);

        assert_eq!(m.submit_answer(right()).unwrap(), Commit::AlreadyAnswered);
        assert_eq!(m.tick(), Tick::Idle);

        let Advance::Completed(report) = m.advance().unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(report.correct_count(), 0);
        assert_eq!(report.total_elapsed_secs(), 10);
    }

    #[test]
    fn manual_skip_scores_incorrect() {
        let mut m = started(1, 1, 30);
        m.tick();
        m.tick();
        assert_eq!(
            m.submit_answer(None).unwrap(),
            Commit::Recorded { is_correct: false }
        );
        assert_eq!(m.last_outcome().unwrap().elapsed_secs(), 2);
    }

    #[test]
    fn untimed_session_of_three_from_five() {
        let mut m = started(5, 3, 0);
        assert_eq!(m.time_remaining(), None);
        assert_eq!(m.tick(), Tick::Idle);

        let report = run_to_report(&mut m, &[right(), Some(ChoiceId::new("wrong")), right()]);
        assert_eq!(report.total_questions(), 3);
        assert_eq!(report.correct_count(), 2);
        assert_eq!(report.total_elapsed_secs(), 0);
        assert_eq!(m.state(), SessionState::Completed);
        assert!(m.outcomes().is_empty());
        assert!(m.progress().is_complete);
    }

    #[test]
    fn advance_requires_an_answer() {
        let mut m = started(2, 2, 30);
        let err = m.advance().unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { operation: "advance", .. }));
    }

    #[test]
    fn loading_and_completed_reject_commands() {
        let mut m = machine(2, 1, 30);
        assert!(matches!(
            m.submit_answer(right()),
            Err(SessionError::InvalidState { state: "loading", .. })
        ));
        assert!(matches!(m.advance(), Err(SessionError::InvalidState { .. })));
        assert!(matches!(m.restart(), Err(SessionError::InvalidState { .. })));

        m.begin().unwrap();
        assert!(matches!(m.begin(), Err(SessionError::InvalidState { .. })));
        run_to_report(&mut m, &[right()]);
        assert!(matches!(
            m.submit_answer(right()),
            Err(SessionError::InvalidState { state: "completed", .. })
        ));
        assert!(matches!(m.advance(), Err(SessionError::InvalidState { .. })));
    }

    #[test]
    fn restart_is_independent_of_previous_run() {
        let mut m = started(4, 2, 30);
        let first_id = m.id();
        let first = run_to_report(&mut m, &[right(), right()]);
        assert_eq!(first.correct_count(), 2);

        m.restart().unwrap();
        assert_ne!(m.id(), first_id);
        assert!(m.outcomes().is_empty());
        assert_eq!(m.current_index(), Some(0));
        assert_eq!(m.time_remaining(), Some(30));

        let second = run_to_report(&mut m, &[None, None]);
        assert_eq!(second.correct_count(), 0);
        assert_eq!(second.total_questions(), 2);
        assert_eq!(first.correct_count(), 2);
    }

    #[test]
    fn disposed_session_ignores_everything() {
        let mut m = started(3, 3, 5);
        m.dispose();
        assert_eq!(m.state(), SessionState::Disposed);
        assert_eq!(m.submit_answer(right()).unwrap(), Commit::Inert);
        assert_eq!(m.advance().unwrap(), Advance::Inert);
        assert_eq!(m.tick(), Tick::Idle);
        m.restart().unwrap();
        m.begin().unwrap();
        assert_eq!(m.state(), SessionState::Disposed);
        assert!(m.outcomes().is_empty());
    }

    #[test]
    fn same_seed_presents_same_session() {
        let a = started(10, 5, 30);
        let b = started(10, 5, 30);
        assert_eq!(a.questions(), b.questions());
    }

    #[test]
    fn progress_tracks_answers() {
        let mut m = started(3, 3, 30);
        m.submit_answer(right()).unwrap();
        let progress = m.progress();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.remaining, 2);
        assert_eq!(progress.current_index, Some(0));
        assert!(!progress.is_complete);
    }
}
