// src/store/problems.rs

use chrono::{Duration, Utc};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        exchange::{ProblemAndTestCaseList, ProblemData, TestCaseData},
        problem::{Problem, TestCase},
    },
};

const SELECT_PROBLEM: &str = "SELECT id, course_id, title, description, visible,
        when_assigned, when_due, created_at
 FROM problems";

/// Problem and test-case storage: the import/export side of the exercise
/// exchange, plus the read surface the other components aggregate over.
pub struct ProblemStore {
    pool: SqlitePool,
}

impl ProblemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, problem_id: i64) -> Result<Option<Problem>, AppError> {
        let sql = format!("{SELECT_PROBLEM} WHERE id = ?");
        let problem = sqlx::query_as::<_, Problem>(&sql)
            .bind(problem_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(problem)
    }

    /// Problems of a course. Students only see visible ones.
    pub async fn problems_in_course(
        &self,
        course_id: i64,
        include_hidden: bool,
    ) -> Result<Vec<Problem>, AppError> {
        let sql = format!(
            "{SELECT_PROBLEM} WHERE course_id = ? AND (visible = 1 OR ?) ORDER BY id ASC"
        );
        let problems = sqlx::query_as::<_, Problem>(&sql)
            .bind(course_id)
            .bind(include_hidden)
            .fetch_all(&self.pool)
            .await?;

        Ok(problems)
    }

    pub async fn test_cases_for_problem(
        &self,
        problem_id: i64,
    ) -> Result<Vec<TestCase>, AppError> {
        let test_cases = sqlx::query_as::<_, TestCase>(
            "SELECT id, problem_id, name, input, expected_output, secret
             FROM test_cases
             WHERE problem_id = ?
             ORDER BY id ASC",
        )
        .bind(problem_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(test_cases)
    }

    /// Stores an imported exercise: the problem and all of its test cases
    /// land in one transaction. Returns the stored problem with its id.
    ///
    /// Imported problems start hidden unless the document says otherwise;
    /// the due date defaults to 48 hours out, to be adjusted by the
    /// instructor afterwards.
    pub async fn import(
        &self,
        course_id: i64,
        exercise: &ProblemAndTestCaseList,
    ) -> Result<Problem, AppError> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let when_due = now + Duration::hours(48);

        let result = sqlx::query(
            "INSERT INTO problems
                (course_id, title, description, visible, when_assigned, when_due, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(course_id)
        .bind(&exercise.problem.title)
        .bind(&exercise.problem.description)
        .bind(exercise.problem.visible)
        .bind(now)
        .bind(when_due)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to import problem: {:?}", e);
            AppError::from(e)
        })?;

        let problem_id = result.last_insert_rowid();

        for test_case in &exercise.test_cases {
            sqlx::query(
                "INSERT INTO test_cases (problem_id, name, input, expected_output, secret)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(problem_id)
            .bind(&test_case.name)
            .bind(&test_case.input)
            .bind(&test_case.expected_output)
            .bind(test_case.secret)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Problem {
            id: problem_id,
            course_id,
            title: exercise.problem.title.clone(),
            description: exercise.problem.description.clone(),
            visible: exercise.problem.visible,
            when_assigned: now,
            when_due,
            created_at: now,
        })
    }

    /// Builds the exchange document for an existing problem.
    pub async fn export(&self, problem_id: i64) -> Result<ProblemAndTestCaseList, AppError> {
        let problem = self.get(problem_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Problem {} not found", problem_id))
        })?;

        let test_cases = self.test_cases_for_problem(problem_id).await?;

        Ok(ProblemAndTestCaseList {
            problem: ProblemData {
                title: problem.title,
                description: problem.description,
                visible: problem.visible,
            },
            test_cases: test_cases
                .into_iter()
                .map(|tc| TestCaseData {
                    name: tc.name,
                    input: tc.input,
                    expected_output: tc.expected_output,
                    secret: tc.secret,
                })
                .collect(),
        })
    }
}
