// src/store/standings.rs

use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    models::{
        receipt::{ProblemSummary, SubmissionReceipt, SubmissionStatus, UserAndReceipt},
        user::User,
    },
};

/// Computes, per (problem, section), the best receipt for each student.
///
/// Pure aggregation over stored receipts: nothing is mutated and nothing is
/// cached across calls, so the result always reflects the latest
/// record/update/replace.
pub struct BestReceiptAggregator {
    pool: SqlitePool,
}

impl BestReceiptAggregator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Best receipt per student registered in `section` of `course_id`, for
    /// `problem_id`. Students with zero receipts are omitted. Ordered by
    /// username for stable output.
    pub async fn best_for(
        &self,
        problem_id: i64,
        course_id: i64,
        section: i64,
    ) -> Result<Vec<UserAndReceipt>, AppError> {
        let students = sqlx::query_as::<_, User>(
            "SELECT u.id, u.username, u.display_name, u.created_at
             FROM users u
             JOIN course_registrations cr ON cr.user_id = u.id
             WHERE cr.course_id = ? AND cr.section = ? AND cr.role = 'student'
             ORDER BY u.username ASC",
        )
        .bind(course_id)
        .bind(section)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch section roster: {:?}", e);
            AppError::from(e)
        })?;

        if students.is_empty() {
            return Ok(Vec::new());
        }

        // Dynamic IN clause over the roster.
        let mut query_builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, user_id, problem_id, revision, status,
                    num_tests_passed, num_tests_attempted, score, created_at
             FROM submission_receipts WHERE problem_id = ",
        );
        query_builder.push_bind(problem_id);
        query_builder.push(" AND user_id IN (");
        let mut separated = query_builder.separated(",");
        for student in &students {
            separated.push_bind(student.id);
        }
        separated.push_unseparated(")");

        let receipts: Vec<SubmissionReceipt> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch receipts for standings: {:?}", e);
                AppError::from(e)
            })?;

        let best = best_by_user(receipts);

        Ok(students
            .into_iter()
            .filter_map(|user| {
                best.get(&user.id).cloned().map(|receipt| UserAndReceipt {
                    user,
                    receipt,
                })
            })
            .collect())
    }

    /// Roll-up of submissions for one problem across all of the course's
    /// student registrations, for the instructor dashboard.
    pub async fn problem_summary(
        &self,
        problem_id: i64,
        course_id: i64,
    ) -> Result<ProblemSummary, AppError> {
        let receipts = sqlx::query_as::<_, SubmissionReceipt>(
            "SELECT r.id, r.user_id, r.problem_id, r.revision, r.status,
                    r.num_tests_passed, r.num_tests_attempted, r.score, r.created_at
             FROM submission_receipts r
             JOIN course_registrations cr
               ON cr.user_id = r.user_id AND cr.course_id = ?
             WHERE r.problem_id = ? AND cr.role = 'student'",
        )
        .bind(course_id)
        .bind(problem_id)
        .fetch_all(&self.pool)
        .await?;

        let best = best_by_user(receipts);

        let num_students_attempted = best.len() as i64;
        let num_students_passed = best
            .values()
            .filter(|r| SubmissionStatus::parse(&r.status) == Some(SubmissionStatus::TestsPassed))
            .count() as i64;
        let mean_best_score = if best.is_empty() {
            0.0
        } else {
            best.values().map(|r| r.score).sum::<f64>() / best.len() as f64
        };

        Ok(ProblemSummary {
            problem_id,
            num_students_attempted,
            num_students_passed,
            mean_best_score,
        })
    }
}

/// Folds receipts down to the best one per user.
fn best_by_user(receipts: Vec<SubmissionReceipt>) -> HashMap<i64, SubmissionReceipt> {
    let mut best: HashMap<i64, SubmissionReceipt> = HashMap::new();
    for receipt in receipts {
        match best.get(&receipt.user_id) {
            Some(incumbent) if !prefer(&receipt, incumbent) => {}
            _ => {
                best.insert(receipt.user_id, receipt);
            }
        }
    }
    best
}

/// Whether `candidate` beats `incumbent`: higher score wins; at equal score
/// the most recent attempt wins; at equal timestamp the later insert wins,
/// so the result is fully deterministic.
fn prefer(candidate: &SubmissionReceipt, incumbent: &SubmissionReceipt) -> bool {
    if candidate.score != incumbent.score {
        return candidate.score > incumbent.score;
    }
    if candidate.created_at != incumbent.created_at {
        return candidate.created_at > incumbent.created_at;
    }
    candidate.id > incumbent.id
}
