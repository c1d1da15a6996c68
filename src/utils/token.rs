// src/utils/token.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::AppError, models::user::CallerIdentity};

/// Bearer-token claims, as minted by the external identity service.
///
/// Credential verification never happens in this backend; by the time a
/// request reaches us the identity service has already vouched for the user
/// and signed these claims with the shared secret.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Username, carried for logging and display.
    pub name: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Signs a bearer token for the user. Used by tests and operational tooling;
/// production tokens come from the identity service.
pub fn sign_token(
    user_id: i64,
    username: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        name: username.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

/// Verifies and decodes a bearer token string.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthenticated("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Axum Middleware: caller identity resolution.
///
/// Intercepts requests, validates the 'Authorization: Bearer <token>' header.
/// If valid, injects a `CallerIdentity` into the request extensions for
/// handlers to use. If invalid, rejects with the `unauthenticated` kind.
pub async fn identity_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return Err(AppError::Unauthenticated(
                "Missing bearer token".to_string(),
            ));
        }
    };

    let claims = verify_token(token, &config.token_secret)?;

    let user_id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AppError::Unauthenticated("Malformed token subject".to_string()))?;

    req.extensions_mut().insert(CallerIdentity {
        user_id,
        username: claims.name,
    });

    Ok(next.run(req).await)
}
