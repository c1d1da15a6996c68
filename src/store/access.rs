// src/store/access.rs

use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{course::CourseRegistration, problem::Problem, user::CallerIdentity},
};

/// Everything a change/receipt operation needs to know after clearing the
/// gate: the problem itself and the caller's registration in its course.
#[derive(Debug)]
pub struct ProblemAccess {
    pub problem: Problem,
    pub registration: CourseRegistration,
}

/// Capability check translating (caller identity, course, problem) into
/// allow/deny. Every operation consults the gate before doing anything; a
/// deny short-circuits with no side effect.
///
/// The gate only reads. Quiz-session state is consulted for the quiz-window
/// policy but never mutated here.
pub struct AccessGate {
    pool: SqlitePool,
}

impl AccessGate {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The caller's registration in `course_id`, or `Forbidden`.
    pub async fn require_registration(
        &self,
        caller: &CallerIdentity,
        course_id: i64,
    ) -> Result<CourseRegistration, AppError> {
        let registration = sqlx::query_as::<_, CourseRegistration>(
            "SELECT id, course_id, user_id, role, section
             FROM course_registrations
             WHERE course_id = ? AND user_id = ?",
        )
        .bind(course_id)
        .bind(caller.user_id)
        .fetch_optional(&self.pool)
        .await?;

        registration.ok_or_else(|| {
            AppError::Forbidden(format!(
                "User '{}' is not registered in course {}",
                caller.username, course_id
            ))
        })
    }

    /// The caller's registration in `course_id`, which must carry the
    /// instructor role.
    pub async fn require_instructor(
        &self,
        caller: &CallerIdentity,
        course_id: i64,
    ) -> Result<CourseRegistration, AppError> {
        let registration = self.require_registration(caller, course_id).await?;
        if !registration.is_instructor() {
            return Err(AppError::Forbidden(
                "This operation requires the instructor role".to_string(),
            ));
        }
        Ok(registration)
    }

    /// Gate for change-log and receipt operations on a problem.
    ///
    /// Resolves the problem and the caller's registration, then applies the
    /// quiz-window policy to students:
    /// - a problem with an active quiz session is reachable only by students
    ///   of a section with an active session for it (an unstarted quiz
    ///   problem is hidden until its session starts);
    /// - a student whose section is sitting an active quiz on some other
    ///   problem of the course is locked to that problem for the duration.
    ///
    /// Instructors bypass both halves.
    pub async fn check_problem_access(
        &self,
        caller: &CallerIdentity,
        problem_id: i64,
    ) -> Result<ProblemAccess, AppError> {
        let problem = sqlx::query_as::<_, Problem>(
            "SELECT id, course_id, title, description, visible,
                    when_assigned, when_due, created_at
             FROM problems WHERE id = ?",
        )
        .bind(problem_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Problem {} not found", problem_id)))?;

        let registration = self.require_registration(caller, problem.course_id).await?;

        if registration.is_instructor() {
            return Ok(ProblemAccess {
                problem,
                registration,
            });
        }

        let active_sections: Vec<i64> = sqlx::query_scalar(
            "SELECT section FROM quiz_sessions
             WHERE problem_id = ? AND end_time IS NULL",
        )
        .bind(problem_id)
        .fetch_all(&self.pool)
        .await?;

        if !active_sections.is_empty() {
            if !active_sections.contains(&registration.section) {
                return Err(AppError::Forbidden(
                    "An active quiz restricts this problem to another section".to_string(),
                ));
            }
        } else if !problem.visible {
            return Err(AppError::Forbidden(
                "This problem is not currently available".to_string(),
            ));
        }

        // Quiz lockdown: while the caller's section has an active session on
        // a different problem of the same course, that problem is the only
        // one they may touch.
        let locked_to_other: Option<i64> = sqlx::query_scalar(
            "SELECT q.problem_id FROM quiz_sessions q
             JOIN problems p ON p.id = q.problem_id
             WHERE q.section = ? AND q.end_time IS NULL
               AND p.course_id = ? AND q.problem_id != ?
             LIMIT 1",
        )
        .bind(registration.section)
        .bind(problem.course_id)
        .bind(problem_id)
        .fetch_optional(&self.pool)
        .await?;

        if locked_to_other.is_some() {
            return Err(AppError::Forbidden(
                "An active quiz for your section restricts access to the quiz problem"
                    .to_string(),
            ));
        }

        Ok(ProblemAccess {
            problem,
            registration,
        })
    }
}
