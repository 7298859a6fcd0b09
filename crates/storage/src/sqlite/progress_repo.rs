use chrono::{DateTime, Utc};
use exam_core::model::{ExamSetId, QuestionId, QuestionProgress, UserId};

use super::SqliteRepository;
use super::mapping::{conn, exam_set_id_to_i64, map_progress_row};
use crate::repository::{QuestionProgressRepository, StorageError};

#[async_trait::async_trait]
impl QuestionProgressRepository for SqliteRepository {
    async fn record_attempt(
        &self,
        user_id: &UserId,
        exam_set_id: ExamSetId,
        question_id: &QuestionId,
        is_correct: bool,
        at: DateTime<Utc>,
    ) -> Result<QuestionProgress, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO question_progress (
                user_id, exam_set_id, question_id, last_result, attempt_count, last_attempted
            )
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            ON CONFLICT(user_id, exam_set_id, question_id) DO UPDATE SET
                last_result = excluded.last_result,
                attempt_count = question_progress.attempt_count + 1,
                last_attempted = excluded.last_attempted
            RETURNING user_id, exam_set_id, question_id, last_result, attempt_count, last_attempted
            ",
        )
        .bind(user_id.as_str())
        .bind(exam_set_id_to_i64(exam_set_id)?)
        .bind(question_id.as_str())
        .bind(i64::from(is_correct))
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        map_progress_row(&row)
    }

    async fn list_progress(
        &self,
        user_id: &UserId,
        exam_set_id: ExamSetId,
    ) -> Result<Vec<QuestionProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, exam_set_id, question_id, last_result, attempt_count, last_attempted
            FROM question_progress
            WHERE user_id = ?1 AND exam_set_id = ?2
            ORDER BY question_id ASC
            ",
        )
        .bind(user_id.as_str())
        .bind(exam_set_id_to_i64(exam_set_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_progress_row).collect()
    }
}
