use exam_core::model::{
    ExamDocument, ExamSet, ExamSetId, QuestionId, QuestionOutcome, QuestionProgress, SessionMode,
    UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{SessionResultRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn exam_set_id_to_i64(id: ExamSetId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("exam_set_id overflow".into()))
}

pub(crate) fn exam_set_id_from_i64(v: i64) -> Result<ExamSetId, StorageError> {
    u64::try_from(v)
        .map(ExamSetId::new)
        .map_err(|_| StorageError::Serialization("exam_set_id sign overflow".into()))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_exam_set_row(row: &SqliteRow) -> Result<ExamSet, StorageError> {
    let raw_document: String = row.try_get("document").map_err(ser)?;
    let document = ExamDocument::from_json(&raw_document).map_err(ser)?;
    let shared: i64 = row.try_get("shared").map_err(ser)?;

    ExamSet::from_persisted(
        exam_set_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        UserId::new(row.try_get::<String, _>("owner").map_err(ser)?),
        document,
        row.try_get("created_at").map_err(ser)?,
        shared != 0,
        u32_from_i64("like_count", row.try_get::<i64, _>("like_count").map_err(ser)?)?,
    )
    .map_err(ser)
}

pub(crate) fn map_result_row(row: &SqliteRow) -> Result<SessionResultRecord, StorageError> {
    let mode: String = row.try_get("session_mode").map_err(ser)?;
    let questions_data: String = row.try_get("questions_data").map_err(ser)?;
    let questions_data: Vec<QuestionOutcome> =
        serde_json::from_str(&questions_data).map_err(ser)?;

    Ok(SessionResultRecord {
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        exam_set_id: exam_set_id_from_i64(row.try_get::<i64, _>("exam_set_id").map_err(ser)?)?,
        mode: mode.parse::<SessionMode>().map_err(ser)?,
        started_at: row.try_get("start_time").map_err(ser)?,
        completed_at: row.try_get("end_time").map_err(ser)?,
        score: u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        questions_data,
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<QuestionProgress, StorageError> {
    let last_result: i64 = row.try_get("last_result").map_err(ser)?;
    Ok(QuestionProgress {
        user_id: UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?),
        exam_set_id: exam_set_id_from_i64(row.try_get::<i64, _>("exam_set_id").map_err(ser)?)?,
        question_id: QuestionId::new(row.try_get::<String, _>("question_id").map_err(ser)?),
        last_result: last_result != 0,
        attempt_count: u32_from_i64(
            "attempt_count",
            row.try_get::<i64, _>("attempt_count").map_err(ser)?,
        )?,
        last_attempted: row.try_get("last_attempted").map_err(ser)?,
    })
}
