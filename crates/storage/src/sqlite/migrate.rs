use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates exam sets, session results, per-question progress and
/// their indexes. Version 2 adds per-user likes and resets `like_count` to
/// the number of like rows.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS exam_sets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    owner TEXT NOT NULL,
                    document TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    shared INTEGER NOT NULL DEFAULT 0 CHECK (shared IN (0, 1)),
                    like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_results (
                    id INTEGER PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    exam_set_id INTEGER NOT NULL,
                    session_mode TEXT NOT NULL,
                    start_time TEXT NOT NULL,
                    end_time TEXT NOT NULL,
                    score INTEGER NOT NULL CHECK (score >= 0),
                    total_questions INTEGER NOT NULL CHECK (total_questions >= score),
                    questions_data TEXT NOT NULL,
                    FOREIGN KEY (exam_set_id) REFERENCES exam_sets(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS question_progress (
                    user_id TEXT NOT NULL,
                    exam_set_id INTEGER NOT NULL,
                    question_id TEXT NOT NULL,
                    last_result INTEGER NOT NULL CHECK (last_result IN (0, 1)),
                    attempt_count INTEGER NOT NULL CHECK (attempt_count > 0),
                    last_attempted TEXT NOT NULL,
                    PRIMARY KEY (user_id, exam_set_id, question_id),
                    FOREIGN KEY (exam_set_id) REFERENCES exam_sets(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_exam_sets_owner_created
                    ON exam_sets (owner, created_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_session_results_user_exam_end
                    ON session_results (user_id, exam_set_id, end_time);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS exam_set_likes (
                    exam_set_id INTEGER NOT NULL,
                    user_id TEXT NOT NULL,
                    liked_at TEXT NOT NULL,
                    PRIMARY KEY (exam_set_id, user_id),
                    FOREIGN KEY (exam_set_id) REFERENCES exam_sets(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                UPDATE exam_sets SET like_count = (
                    SELECT COUNT(*) FROM exam_set_likes WHERE exam_set_id = exam_sets.id
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(2_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
