use std::sync::Arc;

use exam_core::model::{ExamDocument, ExamSet, ExamSetId, UserId};
use exam_core::time::Clock;
use storage::repository::{ExamSetRepository, NewExamSetRecord};

use crate::error::ExamServiceError;

/// Import, browse, and share exam sets.
#[derive(Clone)]
pub struct ExamSetService {
    clock: Clock,
    exam_sets: Arc<dyn ExamSetRepository>,
}

impl ExamSetService {
    #[must_use]
    pub fn new(clock: Clock, exam_sets: Arc<dyn ExamSetRepository>) -> Self {
        Self { clock, exam_sets }
    }

    /// Validate a JSON exam document and store it as a private set owned by
    /// `owner`.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Document` for invalid JSON or questions,
    /// `ExamServiceError::ExamSet` for a blank title, and
    /// `ExamServiceError::Storage` if persistence fails.
    pub async fn import(
        &self,
        owner: &UserId,
        title: &str,
        raw_json: &str,
    ) -> Result<ExamSet, ExamServiceError> {
        let document = ExamDocument::from_json(raw_json)?;
        for question in document.questions() {
            if let Some(issue) = question.correctness_issue() {
                tracing::warn!(question_id = %question.id(), ?issue, "imported question needs review");
            }
        }
        let record = NewExamSetRecord::new(title, owner.clone(), document, self.clock.now())?;
        let id = self.exam_sets.insert_exam_set(record).await?;
        tracing::info!(exam_set_id = %id, owner = %owner, "exam set imported");
        self.get(owner, id).await
    }

    /// Fetch a set the user may see.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::NotFound` when the set is missing or private
    /// to someone else.
    pub async fn get(&self, user: &UserId, id: ExamSetId) -> Result<ExamSet, ExamServiceError> {
        self.exam_sets
            .get_exam_set(id)
            .await?
            .filter(|set| set.is_visible_to(user))
            .ok_or(ExamServiceError::NotFound(id))
    }

    /// # Errors
    ///
    /// Returns `ExamServiceError::Storage` if repository access fails.
    pub async fn list_mine(
        &self,
        owner: &UserId,
        limit: u32,
    ) -> Result<Vec<ExamSet>, ExamServiceError> {
        Ok(self.exam_sets.list_exam_sets(owner, limit).await?)
    }

    /// Shared sets from every user, most liked first.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::Storage` if repository access fails.
    pub async fn list_shared(&self, limit: u32) -> Result<Vec<ExamSet>, ExamServiceError> {
        Ok(self.exam_sets.list_shared_exam_sets(limit).await?)
    }

    /// Flip the shared flag and return the new value.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::NotOwner` unless `user` owns the set.
    pub async fn toggle_share(
        &self,
        user: &UserId,
        id: ExamSetId,
    ) -> Result<bool, ExamServiceError> {
        let set = self.owned(user, id).await?;
        let shared = !set.is_shared();
        self.exam_sets.set_shared(id, shared).await?;
        tracing::info!(exam_set_id = %id, shared, "exam set sharing changed");
        Ok(shared)
    }

    /// Like the set, or take back an earlier like from the same user.
    /// Returns whether `user` now likes it and the resulting count.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::NotFound` if the set is not visible to `user`.
    pub async fn like(
        &self,
        user: &UserId,
        id: ExamSetId,
    ) -> Result<(bool, u32), ExamServiceError> {
        self.get(user, id).await?;
        let (liked, count) = self.exam_sets.toggle_like(id, user).await?;
        tracing::debug!(exam_set_id = %id, user = %user, liked, count, "like toggled");
        Ok((liked, count))
    }

    /// Copy a shared set into a new private set owned by `user`. The copy
    /// keeps the title and document but starts unshared with no likes.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::NotFound` if the set is missing or not
    /// shared, and `ExamServiceError::Storage` if persistence fails.
    pub async fn import_shared(
        &self,
        user: &UserId,
        id: ExamSetId,
    ) -> Result<ExamSet, ExamServiceError> {
        let source = self
            .exam_sets
            .get_exam_set(id)
            .await?
            .filter(ExamSet::is_shared)
            .ok_or(ExamServiceError::NotFound(id))?;
        let record = NewExamSetRecord::new(
            source.title(),
            user.clone(),
            source.document().clone(),
            self.clock.now(),
        )?;
        let copy = self.exam_sets.insert_exam_set(record).await?;
        tracing::info!(exam_set_id = %copy, source = %id, owner = %user, "shared exam set copied");
        self.get(user, copy).await
    }

    /// Delete a set together with its results and history.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::NotOwner` unless `user` owns the set.
    pub async fn delete(&self, user: &UserId, id: ExamSetId) -> Result<(), ExamServiceError> {
        self.owned(user, id).await?;
        self.exam_sets.delete_exam_set(id).await?;
        tracing::info!(exam_set_id = %id, "exam set deleted");
        Ok(())
    }

    /// Serialize a visible set back to the import format.
    ///
    /// # Errors
    ///
    /// Returns `ExamServiceError::NotFound` if the set is not visible to `user`.
    pub async fn export_json(
        &self,
        user: &UserId,
        id: ExamSetId,
    ) -> Result<String, ExamServiceError> {
        let set = self.get(user, id).await?;
        Ok(set.document().to_json_pretty()?)
    }

    async fn owned(&self, user: &UserId, id: ExamSetId) -> Result<ExamSet, ExamServiceError> {
        let set = self.get(user, id).await?;
        if set.owner() != user {
            return Err(ExamServiceError::NotOwner(id));
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::ExamDocumentError;
    use exam_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    const DOC: &str = r#"{ "questions": [
        { "id": "q1", "text": "Capital of France?", "choices": [
            { "id": "paris", "identifier": "A", "text": "Paris", "isCorrect": true },
            { "id": "rome", "identifier": "B", "text": "Rome" }
        ] }
    ] }"#;

    fn service() -> ExamSetService {
        ExamSetService::new(fixed_clock(), Arc::new(InMemoryRepository::new()))
    }

    #[tokio::test]
    async fn import_creates_private_set() {
        let svc = service();
        let alice = UserId::new("alice");
        let set = svc.import(&alice, "Geography", DOC).await.unwrap();
        assert_eq!(set.title(), "Geography");
        assert!(!set.is_shared());
        assert_eq!(set.questions().len(), 1);
        assert_eq!(svc.list_mine(&alice, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn import_rejects_bad_documents() {
        let svc = service();
        let alice = UserId::new("alice");
        let err = svc
            .import(&alice, "Empty", r#"{ "questions": [] }"#)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExamServiceError::Document(ExamDocumentError::NoQuestions)
        ));
        assert!(matches!(
            svc.import(&alice, "  ", DOC).await.unwrap_err(),
            ExamServiceError::ExamSet(_)
        ));
    }

    #[tokio::test]
    async fn private_sets_are_hidden_until_shared() {
        let svc = service();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let id = svc.import(&alice, "Geography", DOC).await.unwrap().id();

        assert!(matches!(
            svc.get(&bob, id).await.unwrap_err(),
            ExamServiceError::NotFound(_)
        ));
        assert!(matches!(
            svc.toggle_share(&bob, id).await.unwrap_err(),
            ExamServiceError::NotFound(_)
        ));

        assert!(svc.toggle_share(&alice, id).await.unwrap());
        assert_eq!(svc.get(&bob, id).await.unwrap().id(), id);
        assert_eq!(svc.like(&bob, id).await.unwrap(), (true, 1));
        assert_eq!(svc.list_shared(10).await.unwrap()[0].like_count(), 1);

        assert!(matches!(
            svc.toggle_share(&bob, id).await.unwrap_err(),
            ExamServiceError::NotOwner(_)
        ));
        assert!(matches!(
            svc.delete(&bob, id).await.unwrap_err(),
            ExamServiceError::NotOwner(_)
        ));
    }

    #[tokio::test]
    async fn repeated_like_from_one_user_is_withdrawn() {
        let svc = service();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let id = svc.import(&alice, "Geography", DOC).await.unwrap().id();
        svc.toggle_share(&alice, id).await.unwrap();

        assert_eq!(svc.like(&bob, id).await.unwrap(), (true, 1));
        assert_eq!(svc.like(&alice, id).await.unwrap(), (true, 2));
        assert_eq!(svc.like(&bob, id).await.unwrap(), (false, 1));
        assert_eq!(svc.get(&bob, id).await.unwrap().like_count(), 1);
    }

    #[tokio::test]
    async fn import_shared_copies_into_a_private_set() {
        let svc = service();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        let id = svc.import(&alice, "Geography", DOC).await.unwrap().id();

        assert!(matches!(
            svc.import_shared(&bob, id).await.unwrap_err(),
            ExamServiceError::NotFound(_)
        ));

        svc.toggle_share(&alice, id).await.unwrap();
        svc.like(&bob, id).await.unwrap();
        let copy = svc.import_shared(&bob, id).await.unwrap();

        assert_ne!(copy.id(), id);
        assert_eq!(copy.owner(), &bob);
        assert_eq!(copy.title(), "Geography");
        assert!(!copy.is_shared());
        assert_eq!(copy.like_count(), 0);
        assert_eq!(copy.document(), svc.get(&alice, id).await.unwrap().document());
        assert_eq!(svc.list_mine(&bob, 10).await.unwrap().len(), 1);

        svc.delete(&alice, id).await.unwrap();
        assert_eq!(svc.get(&bob, copy.id()).await.unwrap().id(), copy.id());
        assert!(matches!(
            svc.get(&alice, copy.id()).await.unwrap_err(),
            ExamServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn export_round_trips_through_import() {
        let svc = service();
        let alice = UserId::new("alice");
        let id = svc.import(&alice, "Geography", DOC).await.unwrap().id();
        let json = svc.export_json(&alice, id).await.unwrap();
        let copy = svc.import(&alice, "Copy", &json).await.unwrap();
        assert_eq!(copy.document(), svc.get(&alice, id).await.unwrap().document());
    }

    #[tokio::test]
    async fn delete_removes_the_set() {
        let svc = service();
        let alice = UserId::new("alice");
        let id = svc.import(&alice, "Geography", DOC).await.unwrap().id();
        svc.delete(&alice, id).await.unwrap();
        assert!(matches!(
            svc.get(&alice, id).await.unwrap_err(),
            ExamServiceError::NotFound(_)
        ));
    }
}
