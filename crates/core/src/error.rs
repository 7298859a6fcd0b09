use thiserror::Error;

use crate::model::{ExamDocumentError, ExamSetError, QuestionError, ReportError, SessionConfigError};

/// Umbrella over the model's validation errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Document(#[from] ExamDocumentError),
    #[error(transparent)]
    ExamSet(#[from] ExamSetError),
    #[error(transparent)]
    Config(#[from] SessionConfigError),
    #[error(transparent)]
    Report(#[from] ReportError),
}
