// src/store/changelog.rs

use chrono::Utc;
use sqlx::{SqlitePool, types::Json};

use crate::{
    error::AppError,
    models::change::{AppendOutcome, Change, ChangeData},
};

const SELECT_CHANGE: &str = "SELECT event_id, user_id, problem_id, revision, payload,
        client_time, created_at
 FROM changes";

/// Append-only, per-(user, problem) ordered log of edit events.
///
/// Appends are optimistic: the batch must extend the stored stream exactly,
/// and a concurrent append racing past the pre-check is caught by the unique
/// (user_id, problem_id, revision) index. Either the whole batch lands or
/// none of it does.
pub struct ChangeLog {
    pool: SqlitePool,
}

impl ChangeLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends a batch of changes to one (user, problem) stream.
    ///
    /// The first revision must equal the last stored revision + 1 (0 for an
    /// empty stream) or the append fails with `RevisionConflict`, signalling
    /// that the client's local revision counter is stale and it must resync
    /// via `changes_since`. Revisions within the batch must be strictly
    /// increasing; a violation is malformed input, not a conflict.
    pub async fn append(
        &self,
        user_id: i64,
        problem_id: i64,
        batch: &[ChangeData],
    ) -> Result<AppendOutcome, AppError> {
        let first = batch
            .first()
            .ok_or_else(|| AppError::BadRequest("Empty change batch".to_string()))?;

        for pair in batch.windows(2) {
            if pair[1].revision <= pair[0].revision {
                return Err(AppError::BadRequest(
                    "Batch revisions must be strictly increasing".to_string(),
                ));
            }
        }

        let mut tx = self.pool.begin().await?;

        let last_revision: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(revision) FROM changes WHERE user_id = ? AND problem_id = ?",
        )
        .bind(user_id)
        .bind(problem_id)
        .fetch_one(&mut *tx)
        .await?;

        let expected = last_revision.map_or(0, |r| r + 1);
        if first.revision != expected {
            return Err(AppError::RevisionConflict(format!(
                "Batch starts at revision {} but the stream expects {}",
                first.revision, expected
            )));
        }

        let now = Utc::now();
        let mut event_ids = Vec::with_capacity(batch.len());

        for change in batch {
            let result = sqlx::query(
                "INSERT INTO changes
                    (user_id, problem_id, revision, kind, payload, client_time, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(user_id)
            .bind(problem_id)
            .bind(change.revision)
            .bind(change.payload.kind_str())
            .bind(Json(&change.payload))
            .bind(change.client_time)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if e.as_database_error()
                    .is_some_and(|db| db.is_unique_violation())
                {
                    AppError::RevisionConflict(format!(
                        "Revision {} was appended concurrently by another session",
                        change.revision
                    ))
                } else {
                    tracing::error!("Failed to append change: {:?}", e);
                    AppError::from(e)
                }
            })?;

            event_ids.push(result.last_insert_rowid());
        }

        tx.commit().await?;

        Ok(AppendOutcome {
            event_ids,
            last_revision: batch.last().map(|c| c.revision).unwrap_or(expected),
        })
    }

    /// Most recent stored change for the stream, regardless of kind.
    pub async fn latest(
        &self,
        user_id: i64,
        problem_id: i64,
    ) -> Result<Option<Change>, AppError> {
        let sql = format!(
            "{SELECT_CHANGE}
             WHERE user_id = ? AND problem_id = ?
             ORDER BY revision DESC LIMIT 1"
        );
        let change = sqlx::query_as::<_, Change>(&sql)
            .bind(user_id)
            .bind(problem_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(change)
    }

    /// Most recent full-text change for the stream: the checkpoint a client
    /// reconstructs from before replaying deltas.
    pub async fn latest_full_text(
        &self,
        user_id: i64,
        problem_id: i64,
    ) -> Result<Option<Change>, AppError> {
        let sql = format!(
            "{SELECT_CHANGE}
             WHERE user_id = ? AND problem_id = ? AND kind = 'full_text'
             ORDER BY revision DESC LIMIT 1"
        );
        let change = sqlx::query_as::<_, Change>(&sql)
            .bind(user_id)
            .bind(problem_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(change)
    }

    /// All changes with revision strictly greater than `base_revision`, in
    /// revision order. Empty when the caller is already current. Pass -1 for
    /// the full stream.
    pub async fn changes_since(
        &self,
        user_id: i64,
        problem_id: i64,
        base_revision: i64,
    ) -> Result<Vec<Change>, AppError> {
        let sql = format!(
            "{SELECT_CHANGE}
             WHERE user_id = ? AND problem_id = ? AND revision > ?
             ORDER BY revision ASC"
        );
        let changes = sqlx::query_as::<_, Change>(&sql)
            .bind(user_id)
            .bind(problem_id)
            .bind(base_revision)
            .fetch_all(&self.pool)
            .await?;

        Ok(changes)
    }

    /// Audit lookup of a single change by its event id.
    pub async fn get(&self, event_id: i64) -> Result<Option<Change>, AppError> {
        let sql = format!("{SELECT_CHANGE} WHERE event_id = ?");
        let change = sqlx::query_as::<_, Change>(&sql)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(change)
    }
}
