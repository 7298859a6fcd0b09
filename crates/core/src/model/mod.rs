mod exam_set;
mod ids;
mod progress;
mod question;
mod report;
mod session;

pub use exam_set::{ExamDocument, ExamDocumentError, ExamSet, ExamSetError};
pub use ids::{ChoiceId, ExamSetId, ParseIdError, QuestionId, SessionId, UserId};
pub use progress::QuestionProgress;
pub use question::{Choice, ChoiceDraft, CorrectnessIssue, Question, QuestionDraft, QuestionError};
pub use report::{ReportError, SessionReport};
pub use session::{PreparedQuestion, QuestionOutcome, SessionConfig, SessionConfigError, SessionMode};
