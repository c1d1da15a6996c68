// src/handlers/submissions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        receipt::{
            RecordReceiptRequest, ReplaceResultsRequest, SubmissionReceipt,
            UpdateReceiptRequest,
        },
        user::CallerIdentity,
    },
    store::{access::AccessGate, problems::ProblemStore, receipts::ReceiptStore},
};

/// Records a freshly graded submission: the receipt and its test results
/// land as one unit.
pub async fn record_receipt(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Json(payload): Json<RecordReceiptRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let gate = AccessGate::new(pool.clone());
    gate.check_problem_access(&caller, payload.problem_id).await?;

    let store = ReceiptStore::new(pool);
    let receipt = store.record(caller.user_id, &payload).await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn get_receipt(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(receipt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let store = ReceiptStore::new(pool.clone());
    let receipt = require_receipt(&store, receipt_id).await?;
    require_receipt_view(&pool, &caller, &receipt).await?;

    Ok(Json(receipt))
}

pub async fn get_results(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(receipt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let store = ReceiptStore::new(pool.clone());
    let receipt = require_receipt(&store, receipt_id).await?;
    require_receipt_view(&pool, &caller, &receipt).await?;

    let results = store.results_for(receipt_id).await?;
    Ok(Json(results))
}

/// Overwrites a receipt's status and counts in place, keeping its identity.
/// Instructor only; used when a submission was graded incorrectly.
pub async fn update_receipt(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(receipt_id): Path<i64>,
    Json(payload): Json<UpdateReceiptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let store = ReceiptStore::new(pool.clone());
    let receipt = require_receipt(&store, receipt_id).await?;
    require_instructor_for_receipt(&pool, &caller, &receipt).await?;

    let updated = store.update(receipt_id, &payload).await?;
    Ok(Json(updated))
}

/// Replaces a receipt's test results wholesale after a retest.
/// Instructor only.
pub async fn replace_results(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(receipt_id): Path<i64>,
    Json(payload): Json<ReplaceResultsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let store = ReceiptStore::new(pool.clone());
    let receipt = require_receipt(&store, receipt_id).await?;
    require_instructor_for_receipt(&pool, &caller, &receipt).await?;

    store.replace_results(receipt_id, &payload.results).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn require_receipt(
    store: &ReceiptStore,
    receipt_id: i64,
) -> Result<SubmissionReceipt, AppError> {
    store.get(receipt_id).await?.ok_or_else(|| {
        AppError::NotFound(format!("Submission receipt {} not found", receipt_id))
    })
}

/// A receipt is visible to its owner and to instructors of the owning
/// course.
async fn require_receipt_view(
    pool: &SqlitePool,
    caller: &CallerIdentity,
    receipt: &SubmissionReceipt,
) -> Result<(), AppError> {
    if receipt.user_id == caller.user_id {
        return Ok(());
    }
    require_instructor_for_receipt(pool, caller, receipt).await
}

async fn require_instructor_for_receipt(
    pool: &SqlitePool,
    caller: &CallerIdentity,
    receipt: &SubmissionReceipt,
) -> Result<(), AppError> {
    let problems = ProblemStore::new(pool.clone());
    let problem = problems.get(receipt.problem_id).await?.ok_or_else(|| {
        AppError::NotFound(format!("Problem {} not found", receipt.problem_id))
    })?;

    let gate = AccessGate::new(pool.clone());
    gate.require_instructor(caller, problem.course_id).await?;
    Ok(())
}
