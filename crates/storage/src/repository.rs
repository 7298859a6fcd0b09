use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::{
    ExamDocument, ExamSet, ExamSetError, ExamSetId, QuestionId, QuestionOutcome,
    QuestionProgress, SessionMode, SessionReport, UserId,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Insert payload for an exam set whose id is assigned by storage.
#[derive(Debug, Clone)]
pub struct NewExamSetRecord {
    pub title: String,
    pub owner: UserId,
    pub document: ExamDocument,
    pub created_at: DateTime<Utc>,
}

impl NewExamSetRecord {
    /// # Errors
    ///
    /// Returns `ExamSetError::EmptyTitle` if the title is blank.
    pub fn new(
        title: impl Into<String>,
        owner: UserId,
        document: ExamDocument,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ExamSetError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(ExamSetError::EmptyTitle);
        }
        Ok(Self {
            title,
            owner,
            document,
            created_at,
        })
    }

    fn into_exam_set(self, id: ExamSetId) -> Result<ExamSet, StorageError> {
        ExamSet::new(id, self.title, self.owner, self.document, self.created_at)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

/// Persisted shape of a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResultRecord {
    pub user_id: UserId,
    pub exam_set_id: ExamSetId,
    pub mode: SessionMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub score: u32,
    pub total_questions: u32,
    pub questions_data: Vec<QuestionOutcome>,
}

impl SessionResultRecord {
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the counts do not fit the
    /// persisted integer width.
    pub fn from_report(
        user_id: UserId,
        exam_set_id: ExamSetId,
        report: &SessionReport,
    ) -> Result<Self, StorageError> {
        let score = u32::try_from(report.correct_count())
            .map_err(|_| StorageError::Serialization("score overflow".into()))?;
        let total_questions = u32::try_from(report.total_questions())
            .map_err(|_| StorageError::Serialization("total_questions overflow".into()))?;
        Ok(Self {
            user_id,
            exam_set_id,
            mode: report.mode(),
            started_at: report.started_at(),
            completed_at: report.completed_at(),
            score,
            total_questions,
            questions_data: report.outcomes().to_vec(),
        })
    }
}

/// A stored session result with its row id.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResultRow {
    pub id: i64,
    pub record: SessionResultRecord,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Repository contract for exam sets.
#[async_trait]
pub trait ExamSetRepository: Send + Sync {
    /// Persist a newly imported exam set and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the set cannot be stored.
    async fn insert_exam_set(&self, record: NewExamSetRecord) -> Result<ExamSetId, StorageError>;

    /// Fetch an exam set by id. Returns `Ok(None)` if missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_exam_set(&self, id: ExamSetId) -> Result<Option<ExamSet>, StorageError>;

    /// List the owner's exam sets, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_exam_sets(&self, owner: &UserId, limit: u32)
    -> Result<Vec<ExamSet>, StorageError>;

    /// List shared exam sets of every owner, most liked first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_shared_exam_sets(&self, limit: u32) -> Result<Vec<ExamSet>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the set does not exist.
    async fn set_shared(&self, id: ExamSetId, shared: bool) -> Result<(), StorageError>;

    /// Flip `user`'s like on the set. Returns whether the user now likes it
    /// and the set's like count afterwards. A user counts at most once.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the set does not exist.
    async fn toggle_like(&self, id: ExamSetId, user: &UserId)
    -> Result<(bool, u32), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the set does not exist.
    async fn delete_exam_set(&self, id: ExamSetId) -> Result<(), StorageError>;
}

/// Repository contract for finished session results.
#[async_trait]
pub trait SessionResultRepository: Send + Sync {
    /// Append a result and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the result cannot be stored.
    async fn append_result(&self, record: &SessionResultRecord) -> Result<i64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_result(&self, id: i64) -> Result<SessionResultRecord, StorageError>;

    /// List a user's results, newest first, optionally for one exam set.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_results(
        &self,
        user_id: &UserId,
        exam_set_id: Option<ExamSetId>,
        limit: u32,
    ) -> Result<Vec<SessionResultRow>, StorageError>;
}

/// Repository contract for per-question attempt history.
#[async_trait]
pub trait QuestionProgressRepository: Send + Sync {
    /// Insert or update the record for one question and return it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn record_attempt(
        &self,
        user_id: &UserId,
        exam_set_id: ExamSetId,
        question_id: &QuestionId,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> Result<QuestionProgress, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_progress(
        &self,
        user_id: &UserId,
        exam_set_id: ExamSetId,
    ) -> Result<Vec<QuestionProgress>, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

type ProgressKey = (UserId, ExamSetId, QuestionId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    exam_sets: Arc<Mutex<BTreeMap<ExamSetId, ExamSet>>>,
    next_exam_set_id: Arc<Mutex<u64>>,
    results: Arc<Mutex<Vec<SessionResultRecord>>>,
    progress: Arc<Mutex<HashMap<ProgressKey, QuestionProgress>>>,
    likes: Arc<Mutex<BTreeSet<(ExamSetId, UserId)>>>,
}

fn poisoned<E: ToString>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_exam_set<T>(
        &self,
        id: ExamSetId,
        f: impl FnOnce(&mut ExamSet) -> T,
    ) -> Result<T, StorageError> {
        let mut guard = self.exam_sets.lock().map_err(poisoned)?;
        let set = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        Ok(f(set))
    }
}

#[async_trait]
impl ExamSetRepository for InMemoryRepository {
    async fn insert_exam_set(&self, record: NewExamSetRecord) -> Result<ExamSetId, StorageError> {
        let id = {
            let mut next = self.next_exam_set_id.lock().map_err(poisoned)?;
            *next += 1;
            ExamSetId::new(*next)
        };
        let set = record.into_exam_set(id)?;
        let mut guard = self.exam_sets.lock().map_err(poisoned)?;
        if guard.contains_key(&id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(id, set);
        Ok(id)
    }

    async fn get_exam_set(&self, id: ExamSetId) -> Result<Option<ExamSet>, StorageError> {
        let guard = self.exam_sets.lock().map_err(poisoned)?;
        Ok(guard.get(&id).cloned())
    }

    async fn list_exam_sets(
        &self,
        owner: &UserId,
        limit: u32,
    ) -> Result<Vec<ExamSet>, StorageError> {
        let guard = self.exam_sets.lock().map_err(poisoned)?;
        let mut sets: Vec<ExamSet> = guard
            .values()
            .filter(|s| s.owner() == owner)
            .cloned()
            .collect();
        sets.sort_by_key(|s| std::cmp::Reverse((s.created_at(), s.id())));
        sets.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(sets)
    }

    async fn list_shared_exam_sets(&self, limit: u32) -> Result<Vec<ExamSet>, StorageError> {
        let guard = self.exam_sets.lock().map_err(poisoned)?;
        let mut sets: Vec<ExamSet> = guard.values().filter(|s| s.is_shared()).cloned().collect();
        sets.sort_by_key(|s| std::cmp::Reverse((s.like_count(), s.created_at(), s.id())));
        sets.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(sets)
    }

    async fn set_shared(&self, id: ExamSetId, shared: bool) -> Result<(), StorageError> {
        self.with_exam_set(id, |set| set.set_shared(shared))
    }

    async fn toggle_like(
        &self,
        id: ExamSetId,
        user: &UserId,
    ) -> Result<(bool, u32), StorageError> {
        let mut sets = self.exam_sets.lock().map_err(poisoned)?;
        let set = sets.get_mut(&id).ok_or(StorageError::NotFound)?;

        let mut likes = self.likes.lock().map_err(poisoned)?;
        let key = (id, user.clone());
        let liked = if likes.remove(&key) {
            false
        } else {
            likes.insert(key)
        };
        let count = likes.iter().filter(|(exam, _)| *exam == id).count();
        let count = u32::try_from(count)
            .map_err(|_| StorageError::Serialization("like count overflow".into()))?;
        set.set_like_count(count);
        Ok((liked, count))
    }

    async fn delete_exam_set(&self, id: ExamSetId) -> Result<(), StorageError> {
        let mut guard = self.exam_sets.lock().map_err(poisoned)?;
        guard.remove(&id).ok_or(StorageError::NotFound)?;
        drop(guard);

        self.results
            .lock()
            .map_err(poisoned)?
            .retain(|r| r.exam_set_id != id);
        self.progress
            .lock()
            .map_err(poisoned)?
            .retain(|(_, exam, _), _| *exam != id);
        self.likes
            .lock()
            .map_err(poisoned)?
            .retain(|(exam, _)| *exam != id);
        Ok(())
    }
}

#[async_trait]
impl SessionResultRepository for InMemoryRepository {
    async fn append_result(&self, record: &SessionResultRecord) -> Result<i64, StorageError> {
        let mut guard = self.results.lock().map_err(poisoned)?;
        guard.push(record.clone());
        i64::try_from(guard.len()).map_err(|_| StorageError::Serialization("id overflow".into()))
    }

    async fn get_result(&self, id: i64) -> Result<SessionResultRecord, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let idx = usize::try_from(id - 1).map_err(|_| StorageError::NotFound)?;
        guard.get(idx).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_results(
        &self,
        user_id: &UserId,
        exam_set_id: Option<ExamSetId>,
        limit: u32,
    ) -> Result<Vec<SessionResultRow>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut rows = Vec::new();
        for (idx, record) in guard.iter().enumerate().rev() {
            if &record.user_id != user_id {
                continue;
            }
            if exam_set_id.is_some_and(|exam| exam != record.exam_set_id) {
                continue;
            }
            let id = i64::try_from(idx + 1)
                .map_err(|_| StorageError::Serialization("id overflow".into()))?;
            rows.push(SessionResultRow {
                id,
                record: record.clone(),
            });
        }
        rows.sort_by_key(|r| std::cmp::Reverse((r.record.completed_at, r.id)));
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

#[async_trait]
impl QuestionProgressRepository for InMemoryRepository {
    async fn record_attempt(
        &self,
        user_id: &UserId,
        exam_set_id: ExamSetId,
        question_id: &QuestionId,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> Result<QuestionProgress, StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let key = (user_id.clone(), exam_set_id, question_id.clone());
        let entry = guard
            .entry(key)
            .and_modify(|p| p.record_attempt(is_correct, at))
            .or_insert_with(|| {
                QuestionProgress::first_attempt(
                    user_id.clone(),
                    exam_set_id,
                    question_id.clone(),
                    is_correct,
                    at,
                )
            });
        Ok(entry.clone())
    }

    async fn list_progress(
        &self,
        user_id: &UserId,
        exam_set_id: ExamSetId,
    ) -> Result<Vec<QuestionProgress>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        let mut out: Vec<QuestionProgress> = guard
            .values()
            .filter(|p| &p.user_id == user_id && p.exam_set_id == exam_set_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.question_id.cmp(&b.question_id));
        Ok(out)
    }
}

/// Bundles the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub exam_sets: Arc<dyn ExamSetRepository>,
    pub results: Arc<dyn SessionResultRepository>,
    pub progress: Arc<dyn QuestionProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let exam_sets: Arc<dyn ExamSetRepository> = Arc::new(repo.clone());
        let results: Arc<dyn SessionResultRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn QuestionProgressRepository> = Arc::new(repo);
        Self {
            exam_sets,
            results,
            progress,
        }
    }
}
