use std::sync::Arc;

use exam_core::model::{ExamSetId, SessionConfig, SessionReport, UserId};
use exam_core::time::Clock;
use storage::repository::{
    ExamSetRepository, QuestionProgressRepository, SessionResultRecord, SessionResultRepository,
    SessionResultRow, Storage,
};

use super::machine::SessionStateMachine;
use super::pool::QuestionPool;
use super::sampler::SessionSampler;
use super::selection::ProgressStrategy;
use crate::error::SessionError;

/// How questions are filtered before sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// The mode is a label only; the whole exam set is eligible.
    #[default]
    PassThrough,
    /// Filter by the user's per-question history.
    History,
}

/// A finished session after the persistence attempt.
#[derive(Debug)]
pub struct CompletedSession {
    pub report: SessionReport,
    /// Row id of the stored result, when saving succeeded.
    pub result_id: Option<i64>,
    /// First persistence failure, if any. The report is valid either way.
    pub persistence_error: Option<SessionError>,
}

/// Starts sessions from stored exam sets and records their results.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    exam_sets: Arc<dyn ExamSetRepository>,
    results: Arc<dyn SessionResultRepository>,
    progress: Arc<dyn QuestionProgressRepository>,
    selection: SelectionPolicy,
    seed: Option<u64>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        exam_sets: Arc<dyn ExamSetRepository>,
        results: Arc<dyn SessionResultRepository>,
        progress: Arc<dyn QuestionProgressRepository>,
    ) -> Self {
        Self {
            clock,
            exam_sets,
            results,
            progress,
            selection: SelectionPolicy::default(),
            seed: None,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.exam_sets),
            Arc::clone(&storage.results),
            Arc::clone(&storage.progress),
        )
    }

    #[must_use]
    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// Seed every session this service starts.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Load an exam set and begin a session on it.
    ///
    /// Sets that are neither owned by `user` nor shared are reported as not
    /// found.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ExamSetNotFound`, `SessionError::EmptyPool`, or
    /// a storage error.
    pub async fn start_session(
        &self,
        user: &UserId,
        exam_set_id: ExamSetId,
        config: SessionConfig,
    ) -> Result<SessionStateMachine, SessionError> {
        let exam_set = self
            .exam_sets
            .get_exam_set(exam_set_id)
            .await?
            .filter(|set| set.is_visible_to(user))
            .ok_or(SessionError::ExamSetNotFound(exam_set_id))?;
        let pool = QuestionPool::from_exam_set(&exam_set)?;

        let sampler = match self.selection {
            SelectionPolicy::PassThrough => SessionSampler::default(),
            SelectionPolicy::History => {
                let history = self.progress.list_progress(user, exam_set_id).await?;
                SessionSampler::new(Arc::new(ProgressStrategy::new(history)))
            }
        };

        let mut machine = SessionStateMachine::new(pool, config)
            .with_sampler(sampler)
            .with_clock(self.clock);
        if let Some(seed) = self.seed {
            machine = machine.with_seed(seed);
        }
        machine.begin()?;
        Ok(machine)
    }

    /// Store the result row for a finished session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the write fails.
    pub async fn save_report(
        &self,
        user: &UserId,
        exam_set_id: ExamSetId,
        report: &SessionReport,
    ) -> Result<i64, SessionError> {
        let record = SessionResultRecord::from_report(user.clone(), exam_set_id, report)?;
        Ok(self.results.append_result(&record).await?)
    }

    /// Fold every outcome of `report` into the user's per-question history.
    ///
    /// A failed write does not stop the remaining ones.
    ///
    /// # Errors
    ///
    /// Returns the first `SessionError::Storage` encountered.
    pub async fn record_progress(
        &self,
        user: &UserId,
        exam_set_id: ExamSetId,
        report: &SessionReport,
    ) -> Result<(), SessionError> {
        let mut first_error = None;
        for outcome in report.outcomes() {
            let written = self
                .progress
                .record_attempt(
                    user,
                    exam_set_id,
                    outcome.question_id(),
                    outcome.is_correct(),
                    report.completed_at(),
                )
                .await;
            if let Err(err) = written {
                tracing::warn!(error = %err, question_id = %outcome.question_id(), "failed to record progress");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        first_error.map_or(Ok(()), |err| Err(err.into()))
    }

    /// Persist the result row and history for `report`.
    ///
    /// Failures are logged and returned alongside the report instead of
    /// replacing it. `result_id` is set whenever the row was stored, even if
    /// history writes failed afterwards.
    pub async fn complete(
        &self,
        user: &UserId,
        exam_set_id: ExamSetId,
        report: SessionReport,
    ) -> CompletedSession {
        let mut persistence_error = None;

        let result_id = match self.save_report(user, exam_set_id, &report).await {
            Ok(id) => {
                tracing::info!(result_id = id, %exam_set_id, "session result saved");
                Some(id)
            }
            Err(err) => {
                tracing::warn!(error = %err, %exam_set_id, "failed to save session result");
                persistence_error = Some(err);
                None
            }
        };

        if let Err(err) = self.record_progress(user, exam_set_id, &report).await {
            if persistence_error.is_none() {
                persistence_error = Some(err);
            }
        }

        CompletedSession {
            report,
            result_id,
            persistence_error,
        }
    }

    /// Most recent results for `user`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on read failures.
    pub async fn recent_results(
        &self,
        user: &UserId,
        exam_set_id: Option<ExamSetId>,
        limit: u32,
    ) -> Result<Vec<SessionResultRow>, SessionError> {
        Ok(self.results.list_results(user, exam_set_id, limit).await?)
    }
}
