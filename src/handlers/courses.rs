// src/handlers/courses.rs

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
    models::{exchange::ProblemAndTestCaseList, user::CallerIdentity},
    store::{access::AccessGate, courses::CourseStore, problems::ProblemStore},
};

/// Courses the caller is registered in, each paired with the registration.
pub async fn list_courses(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, AppError> {
    let store = CourseStore::new(pool);
    let courses = store.courses_for_user(caller.user_id).await?;

    Ok(Json(courses))
}

/// Distinct sections of a course. Instructor only.
pub async fn list_sections(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let gate = AccessGate::new(pool.clone());
    gate.require_instructor(&caller, course_id).await?;

    let store = CourseStore::new(pool);
    let sections = store.sections_for_course(course_id).await?;

    Ok(Json(sections))
}

/// Problems of a course. Students only see visible problems.
pub async fn list_problems(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let gate = AccessGate::new(pool.clone());
    let registration = gate.require_registration(&caller, course_id).await?;

    let store = ProblemStore::new(pool);
    let problems = store
        .problems_in_course(course_id, registration.is_instructor())
        .await?;

    Ok(Json(problems))
}

/// Imports an exercise-exchange document into a course: the problem and its
/// test cases are stored in one transaction. Instructor only.
pub async fn import_problem(
    State(pool): State<SqlitePool>,
    Extension(caller): Extension<CallerIdentity>,
    Path(course_id): Path<i64>,
    Json(payload): Json<ProblemAndTestCaseList>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let gate = AccessGate::new(pool.clone());
    gate.require_instructor(&caller, course_id).await?;

    let store = ProblemStore::new(pool);
    let problem = store.import(course_id, &payload).await?;

    tracing::info!(
        "Imported problem {} ('{}') into course {}",
        problem.id,
        problem.title,
        course_id
    );

    Ok((StatusCode::CREATED, Json(problem)))
}
