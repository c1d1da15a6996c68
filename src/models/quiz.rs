// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Session state as seen by clients. "Not started" is the absence of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Ended,
}

/// Represents the 'quiz_sessions' table in the database.
///
/// A session gates one problem for one course section. `end_time` is NULL
/// while the session is active; a partial unique index on
/// (problem_id, section) keeps at most one active session per pair.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizSession {
    pub id: i64,
    pub problem_id: i64,
    pub section: i64,

    /// Instructor who started the session.
    pub started_by: i64,

    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl QuizSession {
    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn state(&self) -> SessionState {
        if self.is_active() {
            SessionState::Active
        } else {
            SessionState::Ended
        }
    }
}

/// DTO for starting a quiz session.
#[derive(Debug, Deserialize)]
pub struct StartQuizRequest {
    pub problem_id: i64,
    pub section: i64,
}
