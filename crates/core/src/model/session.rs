use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ChoiceId, QuestionId};
use crate::model::question::{Choice, Question};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionConfigError {
    #[error("a session needs at least one question")]
    ZeroQuestions,

    #[error("unknown session mode: {0}")]
    UnknownMode(String),
}

//
// ─── MODE ──────────────────────────────────────────────────────────────────────
//

/// Study mode tag chosen when starting a session.
///
/// On its own the mode does not change which questions are drawn; selection
/// strategies decide whether it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Warmup,
    Review,
    Repetition,
    Comprehensive,
}

impl SessionMode {
    pub const ALL: [SessionMode; 4] = [
        SessionMode::Warmup,
        SessionMode::Review,
        SessionMode::Repetition,
        SessionMode::Comprehensive,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionMode::Warmup => "warmup",
            SessionMode::Review => "review",
            SessionMode::Repetition => "repetition",
            SessionMode::Comprehensive => "comprehensive",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = SessionConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == needle)
            .ok_or_else(|| SessionConfigError::UnknownMode(s.to_owned()))
    }
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionConfigWire {
    mode: SessionMode,
    max_questions: u32,
    time_limit_seconds: u32,
}

/// Parameters of one session run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SessionConfigWire", into = "SessionConfigWire")]
pub struct SessionConfig {
    mode: SessionMode,
    max_questions: u32,
    time_limit_secs: u32,
}

impl SessionConfig {
    pub const DEFAULT_MAX_QUESTIONS: u32 = 10;
    pub const DEFAULT_TIME_LIMIT_SECS: u32 = 30;

    /// A `time_limit_secs` of 0 means questions are untimed.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError::ZeroQuestions` if `max_questions` is 0.
    pub fn new(
        mode: SessionMode,
        max_questions: u32,
        time_limit_secs: u32,
    ) -> Result<Self, SessionConfigError> {
        if max_questions == 0 {
            return Err(SessionConfigError::ZeroQuestions);
        }
        Ok(Self {
            mode,
            max_questions,
            time_limit_secs,
        })
    }

    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[must_use]
    pub fn max_questions(&self) -> u32 {
        self.max_questions
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit_secs
    }

    #[must_use]
    pub fn is_untimed(&self) -> bool {
        self.time_limit_secs == 0
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            max_questions: Self::DEFAULT_MAX_QUESTIONS,
            time_limit_secs: Self::DEFAULT_TIME_LIMIT_SECS,
        }
    }
}

impl TryFrom<SessionConfigWire> for SessionConfig {
    type Error = SessionConfigError;

    fn try_from(w: SessionConfigWire) -> Result<Self, Self::Error> {
        Self::new(w.mode, w.max_questions, w.time_limit_seconds)
    }
}

impl From<SessionConfig> for SessionConfigWire {
    fn from(c: SessionConfig) -> Self {
        Self {
            mode: c.mode,
            max_questions: c.max_questions,
            time_limit_seconds: c.time_limit_secs,
        }
    }
}

//
// ─── PREPARED QUESTION ─────────────────────────────────────────────────────────
//

/// A question as presented in a session: same content, choices reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreparedQuestion(Question);

impl PreparedQuestion {
    /// Presents `source` with its choices in `order` (indices into the source
    /// choice list).
    #[must_use]
    pub fn with_order(source: &Question, order: &[usize]) -> Self {
        Self(source.with_choice_order(order))
    }

    /// Presents `source` in its original choice order.
    #[must_use]
    pub fn unshuffled(source: &Question) -> Self {
        Self(source.clone())
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        self.0.id()
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.0
    }

    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        self.0.choices()
    }
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

/// How one question of a session was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOutcome {
    question: PreparedQuestion,
    #[serde(rename = "selectedAnswer")]
    selected: Option<ChoiceId>,
    is_correct: bool,
    #[serde(rename = "timeSpent")]
    elapsed_secs: u32,
}

impl QuestionOutcome {
    /// Resolve `question` with the given selection; `None` means skipped or
    /// timed out and always scores as incorrect.
    #[must_use]
    pub fn resolve(question: PreparedQuestion, selected: Option<ChoiceId>, elapsed_secs: u32) -> Self {
        let is_correct = question.question().is_correct_answer(selected.as_ref());
        Self {
            question,
            selected,
            is_correct,
            elapsed_secs,
        }
    }

    #[must_use]
    pub fn question(&self) -> &PreparedQuestion {
        &self.question
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        self.question.id()
    }

    #[must_use]
    pub fn selected(&self) -> Option<&ChoiceId> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.selected.is_none()
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_secs
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
