// src/handlers/changes.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{change::AppendChangesRequest, user::CallerIdentity},
    store::{access::AccessGate, changelog::ChangeLog},
};

/// Appends a batch of edit events to the caller's stream for a problem.
///
/// * The whole batch lands or none of it does.
/// * A stale client revision counter is rejected with `revision_conflict`;
///   the client then catches up via the changes listing and retries.
pub async fn append_changes(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Json(payload): Json<AppendChangesRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let gate = AccessGate::new(pool.clone());
    gate.check_problem_access(&caller, payload.problem_id).await?;

    let log = ChangeLog::new(pool);
    let outcome = log
        .append(caller.user_id, payload.problem_id, &payload.changes)
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Most recent change in the caller's stream, regardless of kind.
pub async fn latest_change(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(problem_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let gate = AccessGate::new(pool.clone());
    gate.check_problem_access(&caller, problem_id).await?;

    let log = ChangeLog::new(pool);
    let change = log.latest(caller.user_id, problem_id).await?;

    Ok(Json(change))
}

/// Most recent full-text checkpoint in the caller's stream.
pub async fn latest_full_text_change(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(problem_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let gate = AccessGate::new(pool.clone());
    gate.check_problem_access(&caller, problem_id).await?;

    let log = ChangeLog::new(pool);
    let change = log.latest_full_text(caller.user_id, problem_id).await?;

    Ok(Json(change))
}

/// Query parameters for the catch-up listing.
#[derive(Debug, Deserialize)]
pub struct ChangesSinceParams {
    /// Last revision the client already has; -1 (the default) fetches the
    /// whole stream.
    pub since: Option<i64>,
}

/// All changes after the given revision, in revision order. A reconnecting
/// client passes the last revision it has and replays the rest.
pub async fn list_changes_since(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(problem_id): Path<i64>,
    Query(params): Query<ChangesSinceParams>,
) -> Result<impl IntoResponse, AppError> {
    let gate = AccessGate::new(pool.clone());
    gate.check_problem_access(&caller, problem_id).await?;

    let log = ChangeLog::new(pool);
    let changes = log
        .changes_since(caller.user_id, problem_id, params.since.unwrap_or(-1))
        .await?;

    Ok(Json(changes))
}
