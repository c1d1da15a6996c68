// src/store/receipts.rs

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppError,
    models::receipt::{
        RecordReceiptRequest, SubmissionReceipt, TestOutcome, TestResult, TestResultData,
        UpdateReceiptRequest, compute_score,
    },
};

const SELECT_RECEIPT: &str = "SELECT id, user_id, problem_id, revision, status,
        num_tests_passed, num_tests_attempted, score, created_at
 FROM submission_receipts";

/// Graded submission receipts and their per-test-case results.
///
/// A receipt owns its results exclusively: `replace_results` swaps the whole
/// set inside one transaction, so a reader never observes a mix of old and
/// new rows. `update` recomputes a receipt in place after a grading fix
/// without changing its identity.
pub struct ReceiptStore {
    pool: SqlitePool,
}

impl ReceiptStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a receipt and its test results as one unit, returning the
    /// stored receipt with its assigned id.
    ///
    /// Every result must reference a test case of the receipt's problem;
    /// a foreign test case fails the whole insert with `SchemaMismatch`.
    pub async fn record(
        &self,
        user_id: i64,
        req: &RecordReceiptRequest,
    ) -> Result<SubmissionReceipt, AppError> {
        let mut tx = self.pool.begin().await?;

        let problem_exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM problems WHERE id = ?")
                .bind(req.problem_id)
                .fetch_optional(&mut *tx)
                .await?;
        if problem_exists.is_none() {
            return Err(AppError::NotFound(format!(
                "Problem {} not found",
                req.problem_id
            )));
        }

        validate_results(&mut tx, req.problem_id, &req.results).await?;

        let num_passed = req
            .results
            .iter()
            .filter(|r| r.outcome == TestOutcome::Passed)
            .count() as i64;
        let num_attempted = req.results.len() as i64;
        let score = compute_score(num_passed, num_attempted);
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO submission_receipts
                (user_id, problem_id, revision, status,
                 num_tests_passed, num_tests_attempted, score, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(req.problem_id)
        .bind(req.revision)
        .bind(req.status.as_str())
        .bind(num_passed)
        .bind(num_attempted)
        .bind(score)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert submission receipt: {:?}", e);
            AppError::from(e)
        })?;

        let receipt_id = result.last_insert_rowid();
        insert_results(&mut tx, receipt_id, &req.results).await?;

        tx.commit().await?;

        Ok(SubmissionReceipt {
            id: receipt_id,
            user_id,
            problem_id: req.problem_id,
            revision: req.revision,
            status: req.status.as_str().to_string(),
            num_tests_passed: num_passed,
            num_tests_attempted: num_attempted,
            score,
            created_at: now,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<SubmissionReceipt>, AppError> {
        let sql = format!("{SELECT_RECEIPT} WHERE id = ?");
        let receipt = sqlx::query_as::<_, SubmissionReceipt>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(receipt)
    }

    /// Test results currently owned by a receipt, in stored order.
    pub async fn results_for(&self, receipt_id: i64) -> Result<Vec<TestResult>, AppError> {
        self.require_receipt(receipt_id).await?;

        let results = sqlx::query_as::<_, TestResult>(
            "SELECT id, receipt_id, test_case_id, outcome, stdout, stderr, elapsed_ms
             FROM test_results
             WHERE receipt_id = ?
             ORDER BY id ASC",
        )
        .bind(receipt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    /// Atomically discards the receipt's prior results and stores the new
    /// set. Used for retesting without creating a new receipt. If any new
    /// result fails validation, the old set stays fully intact.
    pub async fn replace_results(
        &self,
        receipt_id: i64,
        new_results: &[TestResultData],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("{SELECT_RECEIPT} WHERE id = ?");
        let receipt = sqlx::query_as::<_, SubmissionReceipt>(&sql)
            .bind(receipt_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Submission receipt {} not found", receipt_id))
            })?;

        validate_results(&mut tx, receipt.problem_id, new_results).await?;

        sqlx::query("DELETE FROM test_results WHERE receipt_id = ?")
            .bind(receipt_id)
            .execute(&mut *tx)
            .await?;

        insert_results(&mut tx, receipt_id, new_results).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Overwrites the mutable fields of an existing receipt in place.
    /// The id never changes; the score is recomputed from the new counts.
    pub async fn update(
        &self,
        receipt_id: i64,
        req: &UpdateReceiptRequest,
    ) -> Result<SubmissionReceipt, AppError> {
        let score = compute_score(req.num_tests_passed, req.num_tests_attempted);

        let result = sqlx::query(
            "UPDATE submission_receipts
             SET status = ?, num_tests_passed = ?, num_tests_attempted = ?, score = ?
             WHERE id = ?",
        )
        .bind(req.status.as_str())
        .bind(req.num_tests_passed)
        .bind(req.num_tests_attempted)
        .bind(score)
        .bind(receipt_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Submission receipt {} not found",
                receipt_id
            )));
        }

        self.get(receipt_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Submission receipt {} not found", receipt_id))
        })
    }

    async fn require_receipt(&self, receipt_id: i64) -> Result<(), AppError> {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM submission_receipts WHERE id = ?")
                .bind(receipt_id)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!(
                "Submission receipt {} not found",
                receipt_id
            )));
        }
        Ok(())
    }
}

/// Checks that every result references a test case of `problem_id`.
async fn validate_results(
    tx: &mut SqliteConnection,
    problem_id: i64,
    results: &[TestResultData],
) -> Result<(), AppError> {
    if results.is_empty() {
        return Ok(());
    }

    let known: Vec<i64> = sqlx::query_scalar("SELECT id FROM test_cases WHERE problem_id = ?")
        .bind(problem_id)
        .fetch_all(&mut *tx)
        .await?;
    let known: HashSet<i64> = known.into_iter().collect();

    for result in results {
        if !known.contains(&result.test_case_id) {
            return Err(AppError::SchemaMismatch(format!(
                "Test case {} does not belong to problem {}",
                result.test_case_id, problem_id
            )));
        }
    }

    Ok(())
}

async fn insert_results(
    tx: &mut SqliteConnection,
    receipt_id: i64,
    results: &[TestResultData],
) -> Result<(), AppError> {
    for result in results {
        sqlx::query(
            "INSERT INTO test_results
                (receipt_id, test_case_id, outcome, stdout, stderr, elapsed_ms)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(receipt_id)
        .bind(result.test_case_id)
        .bind(result.outcome.as_str())
        .bind(&result.stdout)
        .bind(&result.stderr)
        .bind(result.elapsed_ms)
        .execute(&mut *tx)
        .await?;
    }
    Ok(())
}
