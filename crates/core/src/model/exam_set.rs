use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{ExamSetId, QuestionId, UserId};
use crate::model::question::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamDocumentError {
    #[error("malformed exam document: {0}")]
    Malformed(String),

    #[error("exam document has no questions")]
    NoQuestions,

    #[error("question id {0} appears more than once")]
    DuplicateQuestion(QuestionId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamSetError {
    #[error("exam set title cannot be empty")]
    EmptyTitle,

    #[error(transparent)]
    Document(#[from] ExamDocumentError),
}

//
// ─── DOCUMENT ──────────────────────────────────────────────────────────────────
//

#[derive(Deserialize)]
struct DocumentWire {
    #[serde(default)]
    questions: Option<Vec<Question>>,
}

/// The importable/exportable body of an exam set: `{ "questions": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExamDocument {
    questions: Vec<Question>,
}

impl ExamDocument {
    /// Build a document from already-validated questions.
    ///
    /// # Errors
    ///
    /// Returns `ExamDocumentError::NoQuestions` if the list is empty and
    /// `DuplicateQuestion` if two questions share an id.
    pub fn new(questions: Vec<Question>) -> Result<Self, ExamDocumentError> {
        if questions.is_empty() {
            return Err(ExamDocumentError::NoQuestions);
        }
        let mut seen = HashSet::with_capacity(questions.len());
        for q in &questions {
            if !seen.insert(q.id()) {
                return Err(ExamDocumentError::DuplicateQuestion(q.id().clone()));
            }
        }
        Ok(Self { questions })
    }

    /// Parse and validate a JSON exam document.
    ///
    /// # Errors
    ///
    /// Returns `ExamDocumentError::Malformed` for JSON or question-shape errors
    /// and `NoQuestions` when `questions` is missing or empty.
    pub fn from_json(raw: &str) -> Result<Self, ExamDocumentError> {
        let wire: DocumentWire = serde_json::from_str(raw)
            .map_err(|e| ExamDocumentError::Malformed(e.to_string()))?;
        Self::new(wire.questions.unwrap_or_default())
    }

    /// Serialize back to the import format.
    ///
    /// # Errors
    ///
    /// Returns `ExamDocumentError::Malformed` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ExamDocumentError> {
        serde_json::to_string_pretty(self).map_err(|e| ExamDocumentError::Malformed(e.to_string()))
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }
}

//
// ─── EXAM SET ──────────────────────────────────────────────────────────────────
//

/// A titled, owned collection of questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamSet {
    id: ExamSetId,
    title: String,
    owner: UserId,
    document: ExamDocument,
    created_at: DateTime<Utc>,
    shared: bool,
    like_count: u32,
}

impl ExamSet {
    /// Creates a freshly imported, private exam set.
    ///
    /// # Errors
    ///
    /// Returns `ExamSetError::EmptyTitle` if the title is blank.
    pub fn new(
        id: ExamSetId,
        title: impl Into<String>,
        owner: UserId,
        document: ExamDocument,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ExamSetError> {
        Self::from_persisted(id, title, owner, document, created_at, false, 0)
    }

    /// Rehydrate an exam set from storage.
    ///
    /// # Errors
    ///
    /// Returns `ExamSetError::EmptyTitle` if the title is blank.
    pub fn from_persisted(
        id: ExamSetId,
        title: impl Into<String>,
        owner: UserId,
        document: ExamDocument,
        created_at: DateTime<Utc>,
        shared: bool,
        like_count: u32,
    ) -> Result<Self, ExamSetError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(ExamSetError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            owner,
            document,
            created_at,
            shared,
            like_count,
        })
    }

    #[must_use]
    pub fn id(&self) -> ExamSetId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    #[must_use]
    pub fn document(&self) -> &ExamDocument {
        &self.document
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        self.document.questions()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    #[must_use]
    pub fn like_count(&self) -> u32 {
        self.like_count
    }

    /// Whether `user` may start a session on this set.
    #[must_use]
    pub fn is_visible_to(&self, user: &UserId) -> bool {
        self.shared || &self.owner == user
    }

    pub fn set_shared(&mut self, shared: bool) {
        self.shared = shared;
    }

    /// Number of distinct users currently liking the set.
    pub fn set_like_count(&mut self, count: u32) {
        self.like_count = count;
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
