// src/store/quizzes.rs

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{error::AppError, models::quiz::QuizSession};

const SELECT_SESSION: &str = "SELECT id, problem_id, section, started_by, start_time, end_time
 FROM quiz_sessions";

/// Quiz session state machine: a session is created ACTIVE and transitions
/// to ENDED exactly once. "Not started" is the absence of a row.
///
/// The at-most-one-active invariant per (problem, section) is enforced by a
/// partial unique index, so `start` is a single atomic check-and-insert
/// rather than a read followed by a write.
pub struct QuizSessions {
    pool: SqlitePool,
}

impl QuizSessions {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates an ACTIVE session for (problem, section). Fails with
    /// `SessionAlreadyActive` when one already exists.
    pub async fn start(
        &self,
        started_by: i64,
        problem_id: i64,
        section: i64,
    ) -> Result<QuizSession, AppError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO quiz_sessions (problem_id, section, started_by, start_time, end_time)
             VALUES (?, ?, ?, ?, NULL)",
        )
        .bind(problem_id)
        .bind(section)
        .bind(started_by)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                AppError::SessionAlreadyActive(format!(
                    "A quiz session is already active for problem {} section {}",
                    problem_id, section
                ))
            } else {
                tracing::error!("Failed to start quiz session: {:?}", e);
                AppError::from(e)
            }
        })?;

        Ok(QuizSession {
            id: result.last_insert_rowid(),
            problem_id,
            section,
            started_by,
            start_time: now,
            end_time: None,
        })
    }

    /// The ACTIVE session for (problem, section), if any.
    ///
    /// The returned value's `end_time` is populated with "now" so the client
    /// can compute the elapsed duration without trusting its own clock. This
    /// is a read-time projection; the stored row keeps `end_time = NULL`.
    pub async fn current(
        &self,
        problem_id: i64,
        section: i64,
    ) -> Result<Option<QuizSession>, AppError> {
        let sql = format!(
            "{SELECT_SESSION} WHERE problem_id = ? AND section = ? AND end_time IS NULL"
        );
        let session = sqlx::query_as::<_, QuizSession>(&sql)
            .bind(problem_id)
            .bind(section)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session.map(|mut s| {
            s.end_time = Some(Utc::now());
            s
        }))
    }

    pub async fn get(&self, session_id: i64) -> Result<Option<QuizSession>, AppError> {
        let sql = format!("{SELECT_SESSION} WHERE id = ?");
        let session = sqlx::query_as::<_, QuizSession>(&sql)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// Transitions ACTIVE -> ENDED. Ending twice is rejected with
    /// `AlreadyEnded`, never silently ignored. The `end_time IS NULL` guard
    /// makes the transition atomic under concurrent calls.
    pub async fn end(&self, session_id: i64) -> Result<QuizSession, AppError> {
        let session = self.get(session_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Quiz session {} not found", session_id))
        })?;

        if !session.is_active() {
            return Err(AppError::AlreadyEnded(format!(
                "Quiz session {} has already ended",
                session_id
            )));
        }

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE quiz_sessions SET end_time = ? WHERE id = ? AND end_time IS NULL",
        )
        .bind(now)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Lost the race to a concurrent end.
            return Err(AppError::AlreadyEnded(format!(
                "Quiz session {} has already ended",
                session_id
            )));
        }

        Ok(QuizSession {
            end_time: Some(now),
            ..session
        })
    }
}
