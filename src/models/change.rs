// src/models/change.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::error::AppError;

/// What an edit event carries.
///
/// `FullText` is a checkpoint: it holds the complete code text, so a client
/// reconstructing state only needs the latest checkpoint and the deltas after
/// it, never the whole history. `Delta` describes one edit relative to the
/// immediately preceding revision; `position` is a character offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangePayload {
    FullText {
        text: String,
    },
    Delta {
        position: usize,
        removed: String,
        inserted: String,
    },
}

impl ChangePayload {
    /// Value stored in the 'kind' column, used to index checkpoint lookups.
    pub fn kind_str(&self) -> &'static str {
        match self {
            ChangePayload::FullText { .. } => "full_text",
            ChangePayload::Delta { .. } => "delta",
        }
    }

    pub fn is_full_text(&self) -> bool {
        matches!(self, ChangePayload::FullText { .. })
    }
}

/// Represents the 'changes' table in the database: one edit event.
/// Rows are append-only and immutable; `event_id` is assigned by the store.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Change {
    pub event_id: i64,
    pub user_id: i64,
    pub problem_id: i64,

    /// Per-(user, problem) strictly increasing sequence number, starting at 0.
    pub revision: i64,

    pub payload: Json<ChangePayload>,

    /// Client-reported edit time.
    pub client_time: chrono::DateTime<chrono::Utc>,

    /// Server append time.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One edit event as sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeData {
    pub revision: i64,
    pub payload: ChangePayload,
    pub client_time: chrono::DateTime<chrono::Utc>,
}

/// DTO for appending a batch of edit events.
#[derive(Debug, Deserialize, Validate)]
pub struct AppendChangesRequest {
    pub problem_id: i64,

    #[validate(
        length(min = 1, max = 1000, message = "Batch must contain between 1 and 1000 changes."),
        custom(function = validate_change_sizes)
    )]
    pub changes: Vec<ChangeData>,
}

const MAX_TEXT_BYTES: usize = 256 * 1024;

fn validate_change_sizes(changes: &[ChangeData]) -> Result<(), validator::ValidationError> {
    for change in changes {
        let size = match &change.payload {
            ChangePayload::FullText { text } => text.len(),
            ChangePayload::Delta {
                removed, inserted, ..
            } => removed.len() + inserted.len(),
        };
        if size > MAX_TEXT_BYTES {
            return Err(validator::ValidationError::new("change_text_too_large"));
        }
    }
    Ok(())
}

/// Response for an accepted batch.
#[derive(Debug, Serialize)]
pub struct AppendOutcome {
    /// Event ids assigned to the batch, in batch order.
    pub event_ids: Vec<i64>,

    /// Highest stored revision for the stream after the append.
    pub last_revision: i64,
}

/// Byte index of the `chars`-th character of `text`, or None when `chars`
/// is past the end.
fn byte_offset(text: &str, chars: usize) -> Option<usize> {
    let mut iter = text.char_indices();
    for _ in 0..chars {
        iter.next()?;
    }
    Some(iter.next().map_or(text.len(), |(idx, _)| idx))
}

/// Applies one delta to `text` in place.
///
/// The delta must actually match: the characters at `position` must equal
/// `removed`. A mismatch means the client's base revision drifted from the
/// stream and the edit cannot be replayed.
pub fn apply_delta(
    text: &mut String,
    position: usize,
    removed: &str,
    inserted: &str,
) -> Result<(), AppError> {
    let start = byte_offset(text, position).ok_or_else(|| {
        AppError::BadRequest(format!(
            "Delta position {} is past the end of the text",
            position
        ))
    })?;
    let end = start + removed.len();

    if text.get(start..end) != Some(removed) {
        return Err(AppError::BadRequest(
            "Delta does not match the text it removes".to_string(),
        ));
    }

    text.replace_range(start..end, inserted);
    Ok(())
}

/// Reconstructs code text by replaying payloads in revision order.
///
/// The sequence must begin with a `FullText` checkpoint; a later checkpoint
/// resets the buffer and replay continues from there.
pub fn replay<'a, I>(payloads: I) -> Result<String, AppError>
where
    I: IntoIterator<Item = &'a ChangePayload>,
{
    let mut text: Option<String> = None;

    for payload in payloads {
        match payload {
            ChangePayload::FullText { text: full } => {
                text = Some(full.clone());
            }
            ChangePayload::Delta {
                position,
                removed,
                inserted,
            } => {
                let buffer = text.as_mut().ok_or_else(|| {
                    AppError::BadRequest(
                        "Replay must start at a full-text checkpoint".to_string(),
                    )
                })?;
                apply_delta(buffer, *position, removed, inserted)?;
            }
        }
    }

    text.ok_or_else(|| AppError::BadRequest("Nothing to replay".to_string()))
}
