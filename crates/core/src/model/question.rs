use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{ChoiceId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id cannot be empty")]
    EmptyId,

    #[error("question {0} has an empty prompt")]
    EmptyPrompt(QuestionId),

    #[error("question {id} needs at least 2 choices, found {count}")]
    TooFewChoices { id: QuestionId, count: usize },

    #[error("question {0} has a choice with an empty identifier")]
    EmptyChoiceId(QuestionId),

    #[error("question {question} lists choice {choice} more than once")]
    DuplicateChoice { question: QuestionId, choice: ChoiceId },
}

/// Violation of the "exactly one correct choice" rule.
///
/// Questions carrying one of these are still usable; pools flag them so the
/// owner can fix the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectnessIssue {
    NoCorrectChoice,
    MultipleCorrectChoices { count: usize },
}

//
// ─── CHOICE ────────────────────────────────────────────────────────────────────
//

/// One selectable answer.
///
/// `id` is the identifier a user submits ("A", "B", ...); it is both what a
/// renderer shows and what gets scored. `key` is the document's own choice id,
/// kept only so exports and renderers have a stable element key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    id: ChoiceId,
    key: String,
    text: String,
    is_correct: bool,
}

impl Choice {
    /// A blank `key` falls back to the identifier.
    #[must_use]
    pub fn new(
        id: ChoiceId,
        key: impl Into<String>,
        text: impl Into<String>,
        is_correct: bool,
    ) -> Self {
        let key = key.into().trim().to_owned();
        let key = if key.is_empty() {
            id.as_str().to_owned()
        } else {
            key
        };
        Self {
            id,
            key,
            text: text.into().trim().to_owned(),
            is_correct,
        }
    }

    #[must_use]
    pub fn id(&self) -> &ChoiceId {
        &self.id
    }

    /// Display label; the same text as the scoring identifier.
    #[must_use]
    pub fn label(&self) -> &str {
        self.id.as_str()
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question with its choices in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionDraft", into = "QuestionDraft")]
pub struct Question {
    id: QuestionId,
    text: String,
    explanation: Option<String>,
    choices: Vec<Choice>,
}

impl Question {
    /// Builds a question, enforcing the structural rules.
    ///
    /// The correct-choice count is deliberately not enforced here; see
    /// [`Question::correctness_issue`].
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when ids or the prompt are empty, when fewer than
    /// two choices are given, or when a choice identifier repeats.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        explanation: Option<String>,
        choices: Vec<Choice>,
    ) -> Result<Self, QuestionError> {
        if id.as_str().trim().is_empty() {
            return Err(QuestionError::EmptyId);
        }
        let text = text.into().trim().to_owned();
        if text.is_empty() {
            return Err(QuestionError::EmptyPrompt(id));
        }
        if choices.len() < 2 {
            return Err(QuestionError::TooFewChoices {
                id,
                count: choices.len(),
            });
        }

        let mut seen = HashSet::with_capacity(choices.len());
        for choice in &choices {
            if choice.id().as_str().trim().is_empty() {
                return Err(QuestionError::EmptyChoiceId(id));
            }
            if !seen.insert(choice.id()) {
                return Err(QuestionError::DuplicateChoice {
                    question: id,
                    choice: choice.id().clone(),
                });
            }
        }

        let explanation = explanation
            .map(|e| e.trim().to_owned())
            .filter(|e| !e.is_empty());

        Ok(Self {
            id,
            text,
            explanation,
            choices,
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    #[must_use]
    pub fn choice(&self, id: &ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id() == id)
    }

    /// True when `selected` names a choice flagged correct.
    #[must_use]
    pub fn is_correct_answer(&self, selected: Option<&ChoiceId>) -> bool {
        selected
            .and_then(|id| self.choice(id))
            .is_some_and(Choice::is_correct)
    }

    #[must_use]
    pub fn correct_choice_count(&self) -> usize {
        self.choices.iter().filter(|c| c.is_correct()).count()
    }

    #[must_use]
    pub fn correctness_issue(&self) -> Option<CorrectnessIssue> {
        match self.correct_choice_count() {
            1 => None,
            0 => Some(CorrectnessIssue::NoCorrectChoice),
            count => Some(CorrectnessIssue::MultipleCorrectChoices { count }),
        }
    }

    /// Returns a copy with the choices reordered by `order` (indices into the
    /// current choice list). Indices that are out of range or repeated are
    /// ignored, and any choice not named is appended in its original order.
    #[must_use]
    pub fn with_choice_order(&self, order: &[usize]) -> Self {
        let mut taken = vec![false; self.choices.len()];
        let mut choices = Vec::with_capacity(self.choices.len());
        for &idx in order {
            if idx < self.choices.len() && !taken[idx] {
                taken[idx] = true;
                choices.push(self.choices[idx].clone());
            }
        }
        for (idx, choice) in self.choices.iter().enumerate() {
            if !taken[idx] {
                choices.push(choice.clone());
            }
        }
        Self {
            id: self.id.clone(),
            text: self.text.clone(),
            explanation: self.explanation.clone(),
            choices,
        }
    }
}

//
// ─── WIRE SHAPE ────────────────────────────────────────────────────────────────
//

/// JSON shape of a choice inside an exam document.
///
/// `identifier` is the submitted and scored value; `id` is an element key.
/// A document without identifiers is scored by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceDraft {
    pub id: String,
    #[serde(default)]
    pub identifier: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// JSON shape of a question inside an exam document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChoiceDraft>,
}

impl QuestionDraft {
    /// Validate the draft into a domain `Question`.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the structure is invalid.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let choices = self
            .choices
            .into_iter()
            .map(|c| {
                let identifier = if c.identifier.trim().is_empty() {
                    c.id.trim().to_owned()
                } else {
                    c.identifier.trim().to_owned()
                };
                Choice::new(ChoiceId::new(identifier), c.id, c.text, c.is_correct)
            })
            .collect();
        Question::new(QuestionId::new(self.id), self.text, self.explanation, choices)
    }
}

impl TryFrom<QuestionDraft> for Question {
    type Error = QuestionError;

    fn try_from(draft: QuestionDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<Question> for QuestionDraft {
    fn from(q: Question) -> Self {
        Self {
            id: q.id.as_str().to_owned(),
            text: q.text,
            explanation: q.explanation,
            choices: q
                .choices
                .into_iter()
                .map(|c| ChoiceDraft {
                    identifier: c.id.as_str().to_owned(),
                    id: c.key,
                    text: c.text,
                    is_correct: c.is_correct,
                })
                .collect(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
