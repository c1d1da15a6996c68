// src/models/problem.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'problems' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Problem {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,

    /// Students only see visible problems; instructors see all.
    pub visible: bool,

    pub when_assigned: chrono::DateTime<chrono::Utc>,
    pub when_due: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'test_cases' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub problem_id: i64,
    pub name: String,
    pub input: String,
    pub expected_output: String,

    /// Secret cases are excluded from student-facing listings.
    pub secret: bool,
}

/// Student-facing view of a test case: name only, no input/output data.
#[derive(Debug, Serialize)]
pub struct TestCaseName {
    pub id: i64,
    pub name: String,
}
