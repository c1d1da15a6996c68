// src/handlers/problems.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{problem::TestCaseName, user::CallerIdentity},
    store::{access::AccessGate, problems::ProblemStore, standings::BestReceiptAggregator},
};

/// Exports a problem as an exercise-exchange document. Instructor only.
pub async fn export_problem(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(problem_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let store = ProblemStore::new(pool.clone());
    let problem = store
        .get(problem_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Problem {} not found", problem_id)))?;

    let gate = AccessGate::new(pool);
    gate.require_instructor(&caller, problem.course_id).await?;

    let exercise = store.export(problem_id).await?;
    Ok(Json(exercise))
}

/// Test cases of a problem. Instructors get everything; students get the
/// names of non-secret cases only.
pub async fn list_test_cases(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(problem_id): Path<i64>,
) -> Result<Response, AppError> {
    let gate = AccessGate::new(pool.clone());
    let access = gate.check_problem_access(&caller, problem_id).await?;

    let store = ProblemStore::new(pool);
    let test_cases = store.test_cases_for_problem(problem_id).await?;

    if access.registration.is_instructor() {
        return Ok(Json(test_cases).into_response());
    }

    let names: Vec<TestCaseName> = test_cases
        .into_iter()
        .filter(|tc| !tc.secret)
        .map(|tc| TestCaseName {
            id: tc.id,
            name: tc.name,
        })
        .collect();

    Ok(Json(names).into_response())
}

/// Query parameters for the standings view.
#[derive(Debug, Deserialize)]
pub struct StandingsParams {
    pub section: i64,
}

/// Best receipt per student of a section for this problem. Instructor only.
pub async fn best_receipts(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(problem_id): Path<i64>,
    Query(params): Query<StandingsParams>,
) -> Result<impl IntoResponse, AppError> {
    let store = ProblemStore::new(pool.clone());
    let problem = store
        .get(problem_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Problem {} not found", problem_id)))?;

    let gate = AccessGate::new(pool.clone());
    gate.require_instructor(&caller, problem.course_id).await?;

    let aggregator = BestReceiptAggregator::new(pool);
    let standings = aggregator
        .best_for(problem_id, problem.course_id, params.section)
        .await?;

    Ok(Json(standings))
}

/// Submission roll-up for a problem. Instructor only.
pub async fn problem_summary(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(problem_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let store = ProblemStore::new(pool.clone());
    let problem = store
        .get(problem_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Problem {} not found", problem_id)))?;

    let gate = AccessGate::new(pool.clone());
    gate.require_instructor(&caller, problem.course_id).await?;

    let aggregator = BestReceiptAggregator::new(pool);
    let summary = aggregator
        .problem_summary(problem_id, problem.course_id)
        .await?;

    Ok(Json(summary))
}
