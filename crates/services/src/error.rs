//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{ExamDocumentError, ExamSetError, ExamSetId, ReportError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the session engine and its workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    EmptyPool,
    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("exam set {0} not found")]
    ExamSetNotFound(ExamSetId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ExamSetService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamServiceError {
    #[error(transparent)]
    Document(#[from] ExamDocumentError),
    #[error(transparent)]
    ExamSet(#[from] ExamSetError),
    #[error("exam set {0} not found")]
    NotFound(ExamSetId),
    #[error("exam set {0} belongs to another user")]
    NotOwner(ExamSetId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while assembling `AppServices`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
