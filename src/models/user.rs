// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'users' table in the database.
///
/// Account provisioning and credential storage live with the external
/// identity service; this backend only reads user rows.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Name shown in rosters and standings.
    pub display_name: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The authenticated caller, resolved from the bearer token by the identity
/// middleware and injected into request extensions.
#[derive(Debug, Clone, Serialize)]
pub struct CallerIdentity {
    pub user_id: i64,
    pub username: String,
}
