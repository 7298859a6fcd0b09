use chrono::Utc;
use exam_core::model::{ExamSet, ExamSetId, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, exam_set_id_from_i64, exam_set_id_to_i64, map_exam_set_row, ser};
use crate::repository::{ExamSetRepository, NewExamSetRecord, StorageError};

const EXAM_SET_COLUMNS: &str = "id, title, owner, document, created_at, shared, like_count";

#[async_trait::async_trait]
impl ExamSetRepository for SqliteRepository {
    async fn insert_exam_set(&self, record: NewExamSetRecord) -> Result<ExamSetId, StorageError> {
        let document = serde_json::to_string(&record.document).map_err(ser)?;

        let res = sqlx::query(
            r"
            INSERT INTO exam_sets (title, owner, document, created_at, shared, like_count)
            VALUES (?1, ?2, ?3, ?4, 0, 0)
            ",
        )
        .bind(record.title)
        .bind(record.owner.as_str())
        .bind(document)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        exam_set_id_from_i64(res.last_insert_rowid())
    }

    async fn get_exam_set(&self, id: ExamSetId) -> Result<Option<ExamSet>, StorageError> {
        let sql = format!("SELECT {EXAM_SET_COLUMNS} FROM exam_sets WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(exam_set_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_exam_set_row).transpose()
    }

    async fn list_exam_sets(
        &self,
        owner: &UserId,
        limit: u32,
    ) -> Result<Vec<ExamSet>, StorageError> {
        let sql = format!(
            "SELECT {EXAM_SET_COLUMNS} FROM exam_sets WHERE owner = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(owner.as_str())
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_exam_set_row).collect()
    }

    async fn list_shared_exam_sets(&self, limit: u32) -> Result<Vec<ExamSet>, StorageError> {
        let sql = format!(
            "SELECT {EXAM_SET_COLUMNS} FROM exam_sets WHERE shared = 1 \
             ORDER BY like_count DESC, created_at DESC, id DESC LIMIT ?1"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_exam_set_row).collect()
    }

    async fn set_shared(&self, id: ExamSetId, shared: bool) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE exam_sets SET shared = ?1 WHERE id = ?2")
            .bind(i64::from(shared))
            .bind(exam_set_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn toggle_like(
        &self,
        id: ExamSetId,
        user: &UserId,
    ) -> Result<(bool, u32), StorageError> {
        let exam_set_id = exam_set_id_to_i64(id)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let exists = sqlx::query("SELECT 1 FROM exam_sets WHERE id = ?1")
            .bind(exam_set_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Err(StorageError::NotFound);
        }

        let removed =
            sqlx::query("DELETE FROM exam_set_likes WHERE exam_set_id = ?1 AND user_id = ?2")
                .bind(exam_set_id)
                .bind(user.as_str())
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
        let liked = removed.rows_affected() == 0;
        if liked {
            sqlx::query(
                r"
                INSERT INTO exam_set_likes (exam_set_id, user_id, liked_at)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(exam_set_id)
            .bind(user.as_str())
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        let row = sqlx::query(
            r"
            UPDATE exam_sets
            SET like_count = (SELECT COUNT(*) FROM exam_set_likes WHERE exam_set_id = ?1)
            WHERE id = ?1
            RETURNING like_count
            ",
        )
        .bind(exam_set_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;

        let count: i64 = row.try_get("like_count").map_err(ser)?;
        Ok((liked, u32::try_from(count).map_err(ser)?))
    }

    async fn delete_exam_set(&self, id: ExamSetId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM exam_sets WHERE id = ?1")
            .bind(exam_set_id_to_i64(id)?)
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
