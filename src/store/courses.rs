// src/store/courses.rs

use sqlx::{FromRow, SqlitePool};

use crate::{
    error::AppError,
    models::course::{Course, CourseAndRegistration, CourseRegistration},
};

/// Flat row for the courses-for-user join; folded into the named
/// `CourseAndRegistration` record before leaving the store.
#[derive(FromRow)]
struct CourseRegistrationRow {
    course_id: i64,
    course_name: String,
    course_title: String,
    term_name: String,
    registration_id: i64,
    user_id: i64,
    role: String,
    section: i64,
}

/// Read-only course and registration lookups. Rosters are owned by the
/// registrar tooling; this backend only consumes them.
pub struct CourseStore {
    pool: SqlitePool,
}

impl CourseStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every course the user is registered in, paired with the registration.
    pub async fn courses_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<CourseAndRegistration>, AppError> {
        let rows = sqlx::query_as::<_, CourseRegistrationRow>(
            "SELECT c.id AS course_id, c.name AS course_name, c.title AS course_title,
                    c.term_name AS term_name,
                    cr.id AS registration_id, cr.user_id AS user_id,
                    cr.role AS role, cr.section AS section
             FROM course_registrations cr
             JOIN courses c ON c.id = cr.course_id
             WHERE cr.user_id = ?
             ORDER BY c.id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch courses for user {}: {:?}", user_id, e);
            AppError::from(e)
        })?;

        Ok(rows
            .into_iter()
            .map(|row| CourseAndRegistration {
                course: Course {
                    id: row.course_id,
                    name: row.course_name,
                    title: row.course_title,
                    term_name: row.term_name,
                },
                registration: CourseRegistration {
                    id: row.registration_id,
                    course_id: row.course_id,
                    user_id: row.user_id,
                    role: row.role,
                    section: row.section,
                },
            })
            .collect())
    }

    /// Distinct sections with at least one registration in the course.
    pub async fn sections_for_course(&self, course_id: i64) -> Result<Vec<i64>, AppError> {
        let sections = sqlx::query_scalar(
            "SELECT DISTINCT section FROM course_registrations
             WHERE course_id = ?
             ORDER BY section ASC",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sections)
    }
}
