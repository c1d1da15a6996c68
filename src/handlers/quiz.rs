// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{quiz::StartQuizRequest, user::CallerIdentity},
    store::{access::AccessGate, problems::ProblemStore, quizzes::QuizSessions},
};

/// Starts a quiz session gating a problem for one course section.
///
/// * Instructor of the owning course only.
/// * At most one active session per (problem, section): a duplicate start
///   is rejected with `session_already_active`.
pub async fn start_quiz(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Json(payload): Json<StartQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let problems = ProblemStore::new(pool.clone());
    let problem = problems.get(payload.problem_id).await?.ok_or_else(|| {
        AppError::NotFound(format!("Problem {} not found", payload.problem_id))
    })?;

    let gate = AccessGate::new(pool.clone());
    gate.require_instructor(&caller, problem.course_id).await?;

    let sessions = QuizSessions::new(pool);
    let session = sessions
        .start(caller.user_id, payload.problem_id, payload.section)
        .await?;

    tracing::info!(
        "Quiz session {} started for problem {} section {}",
        session.id,
        session.problem_id,
        session.section
    );

    Ok((StatusCode::CREATED, Json(session)))
}

/// The active quiz session for the caller's section, if any. The returned
/// `end_time` is set to "now" so the client can compute elapsed time without
/// trusting its own clock.
pub async fn current_quiz(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(problem_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let problems = ProblemStore::new(pool.clone());
    let problem = problems
        .get(problem_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Problem {} not found", problem_id)))?;

    let gate = AccessGate::new(pool.clone());
    let registration = gate.require_registration(&caller, problem.course_id).await?;

    let sessions = QuizSessions::new(pool);
    let session = sessions.current(problem_id, registration.section).await?;

    Ok(Json(session))
}

/// Ends an active quiz session. Ending twice is rejected with
/// `already_ended`. Instructor of the owning course only.
pub async fn end_quiz(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(session_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = QuizSessions::new(pool.clone());
    let session = sessions.get(session_id).await?.ok_or_else(|| {
        AppError::NotFound(format!("Quiz session {} not found", session_id))
    })?;

    let problems = ProblemStore::new(pool.clone());
    let problem = problems.get(session.problem_id).await?.ok_or_else(|| {
        AppError::NotFound(format!("Problem {} not found", session.problem_id))
    })?;

    let gate = AccessGate::new(pool);
    gate.require_instructor(&caller, problem.course_id).await?;

    let ended = sessions.end(session_id).await?;

    tracing::info!("Quiz session {} ended", ended.id);

    Ok(Json(ended))
}
