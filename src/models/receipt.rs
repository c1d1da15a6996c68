// src/models/receipt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Overall outcome of grading one code snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    CompileError,
    TestsFailed,
    TestsPassed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::CompileError => "compile_error",
            SubmissionStatus::TestsFailed => "tests_failed",
            SubmissionStatus::TestsPassed => "tests_passed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "compile_error" => Some(SubmissionStatus::CompileError),
            "tests_failed" => Some(SubmissionStatus::TestsFailed),
            "tests_passed" => Some(SubmissionStatus::TestsPassed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one test case run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed,
    Timeout,
    Error,
}

impl TestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestOutcome::Passed => "passed",
            TestOutcome::Failed => "failed",
            TestOutcome::Timeout => "timeout",
            TestOutcome::Error => "error",
        }
    }
}

/// Represents the 'submission_receipts' table in the database.
/// The graded outcome of testing one code snapshot; identified by `id` for
/// its whole lifetime, even across retests.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub id: i64,
    pub user_id: i64,
    pub problem_id: i64,

    /// The change-log revision the graded snapshot corresponds to.
    pub revision: i64,

    pub status: String,
    pub num_tests_passed: i64,
    pub num_tests_attempted: i64,

    /// Normalized passed/attempted, 0.0 when no tests ran.
    pub score: f64,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'test_results' table in the database.
/// Owned exclusively by one receipt; replaced as a unit on retest.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    pub receipt_id: i64,
    pub test_case_id: i64,
    pub outcome: String,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: i64,
}

/// One graded test case as produced by the external test executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResultData {
    pub test_case_id: i64,
    pub outcome: TestOutcome,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub elapsed_ms: i64,
}

/// DTO for recording a freshly graded submission.
#[derive(Debug, Deserialize, Validate)]
pub struct RecordReceiptRequest {
    pub problem_id: i64,
    pub revision: i64,
    pub status: SubmissionStatus,
    #[validate(length(max = 500, message = "Too many test results."))]
    pub results: Vec<TestResultData>,
}

/// DTO for recomputing a receipt in place after a grading fix.
#[derive(Debug, Deserialize)]
pub struct UpdateReceiptRequest {
    pub status: SubmissionStatus,
    pub num_tests_passed: i64,
    pub num_tests_attempted: i64,
}

/// DTO for replacing a receipt's test results wholesale.
#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceResultsRequest {
    #[validate(length(max = 500, message = "Too many test results."))]
    pub results: Vec<TestResultData>,
}

/// Normalized score for a receipt. 0.0 when nothing was attempted, so a
/// compile error never divides by zero.
pub fn compute_score(passed: i64, attempted: i64) -> f64 {
    if attempted <= 0 {
        return 0.0;
    }
    passed as f64 / attempted as f64
}

/// A student paired with their best receipt for a problem.
/// Named record for the standings query result.
#[derive(Debug, Serialize)]
pub struct UserAndReceipt {
    pub user: crate::models::user::User,
    pub receipt: SubmissionReceipt,
}

/// Instructor-dashboard roll-up of submissions for one problem.
#[derive(Debug, Serialize)]
pub struct ProblemSummary {
    pub problem_id: i64,

    /// Students with at least one receipt.
    pub num_students_attempted: i64,

    /// Students whose best receipt passed every attempted test.
    pub num_students_passed: i64,

    /// Mean of each attempting student's best score.
    pub mean_best_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_score_full_marks() {
        assert_eq!(compute_score(4, 4), 1.0);
    }

    #[test]
    fn test_compute_score_partial() {
        assert_eq!(compute_score(1, 4), 0.25);
    }

    #[test]
    fn test_compute_score_no_tests() {
        // Compile errors record zero attempted tests.
        assert_eq!(compute_score(0, 0), 0.0);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            SubmissionStatus::CompileError,
            SubmissionStatus::TestsFailed,
            SubmissionStatus::TestsPassed,
        ] {
            assert_eq!(SubmissionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SubmissionStatus::parse("bogus"), None);
    }
}
