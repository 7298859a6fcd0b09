use std::sync::Arc;

use exam_core::time::Clock;
use storage::repository::Storage;

use crate::error::AppServicesError;
use crate::exam_service::ExamSetService;
use crate::sessions::{SelectionPolicy, SessionLoopService};

/// Assembles the services a front end needs over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    exam_sets: Arc<ExamSetService>,
    session_loop: Arc<SessionLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        selection: SelectionPolicy,
        seed: Option<u64>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, selection, seed))
    }

    #[must_use]
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        selection: SelectionPolicy,
        seed: Option<u64>,
    ) -> Self {
        let exam_sets = Arc::new(ExamSetService::new(clock, Arc::clone(&storage.exam_sets)));
        let session_loop = Arc::new(
            SessionLoopService::from_storage(clock, storage)
                .with_selection(selection)
                .with_seed(seed),
        );
        Self {
            exam_sets,
            session_loop,
        }
    }

    #[must_use]
    pub fn exam_sets(&self) -> Arc<ExamSetService> {
        Arc::clone(&self.exam_sets)
    }

    #[must_use]
    pub fn session_loop(&self) -> Arc<SessionLoopService> {
        Arc::clone(&self.session_loop)
    }
}
