// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{changes, courses, problems, quiz, submissions},
    state::AppState,
    utils::token::identity_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (courses, problems, changes, submissions, quizzes).
/// * Applies global middleware (Trace, CORS) and the identity middleware.
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let course_routes = Router::new()
        .route("/", get(courses::list_courses))
        .route("/{id}/sections", get(courses::list_sections))
        .route("/{id}/problems", get(courses::list_problems))
        .route("/{id}/problems/import", post(courses::import_problem));

    let problem_routes = Router::new()
        .route("/{id}/export", get(problems::export_problem))
        .route("/{id}/test-cases", get(problems::list_test_cases))
        .route("/{id}/standings", get(problems::best_receipts))
        .route("/{id}/summary", get(problems::problem_summary))
        .route("/{id}/quiz", get(quiz::current_quiz))
        .route("/{id}/changes", get(changes::list_changes_since))
        .route("/{id}/changes/latest", get(changes::latest_change))
        .route(
            "/{id}/changes/latest-full-text",
            get(changes::latest_full_text_change),
        );

    let change_routes = Router::new().route("/", post(changes::append_changes));

    let submission_routes = Router::new()
        .route("/", post(submissions::record_receipt))
        .route(
            "/{id}",
            get(submissions::get_receipt).put(submissions::update_receipt),
        )
        .route(
            "/{id}/results",
            get(submissions::get_results).put(submissions::replace_results),
        );

    let quiz_routes = Router::new()
        .route("/", post(quiz::start_quiz))
        .route("/{id}/end", post(quiz::end_quiz));

    Router::new()
        .nest("/api/courses", course_routes)
        .nest("/api/problems", problem_routes)
        .nest("/api/changes", change_routes)
        .nest("/api/submissions", submission_routes)
        .nest("/api/quizzes", quiz_routes)
        // Every route is authenticated; unmatched paths still 404.
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
