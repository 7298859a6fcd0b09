use exam_core::model::{ExamSetId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, exam_set_id_to_i64, map_result_row, ser};
use crate::repository::{
    SessionResultRecord, SessionResultRepository, SessionResultRow, StorageError,
};

const RESULT_COLUMNS: &str = "id, user_id, exam_set_id, session_mode, start_time, end_time, \
                              score, total_questions, questions_data";

#[async_trait::async_trait]
impl SessionResultRepository for SqliteRepository {
    async fn append_result(&self, record: &SessionResultRecord) -> Result<i64, StorageError> {
        let questions_data = serde_json::to_string(&record.questions_data).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO session_results (
                    user_id, exam_set_id, session_mode, start_time, end_time,
                    score, total_questions, questions_data
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(record.user_id.as_str())
        .bind(exam_set_id_to_i64(record.exam_set_id)?)
        .bind(record.mode.as_str())
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(i64::from(record.score))
        .bind(i64::from(record.total_questions))
        .bind(questions_data)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_result(&self, id: i64) -> Result<SessionResultRecord, StorageError> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM session_results WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_result_row(&row)
    }

    async fn list_results(
        &self,
        user_id: &UserId,
        exam_set_id: Option<ExamSetId>,
        limit: u32,
    ) -> Result<Vec<SessionResultRow>, StorageError> {
        let mut sql = format!("SELECT {RESULT_COLUMNS} FROM session_results WHERE user_id = ?1");
        let mut bind_index = 2;
        if exam_set_id.is_some() {
            sql.push_str(" AND exam_set_id = ?");
            sql.push_str(&bind_index.to_string());
            bind_index += 1;
        }
        sql.push_str(" ORDER BY end_time DESC, id DESC LIMIT ?");
        sql.push_str(&bind_index.to_string());

        let mut query = sqlx::query(&sql).bind(user_id.as_str());
        if let Some(exam) = exam_set_id {
            query = query.bind(exam_set_id_to_i64(exam)?);
        }
        query = query.bind(i64::from(limit));

        let rows = query.fetch_all(&self.pool).await.map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(ser)?;
            out.push(SessionResultRow {
                id,
                record: map_result_row(&row)?,
            });
        }
        Ok(out)
    }
}
