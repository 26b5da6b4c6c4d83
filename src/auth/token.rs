use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, AppResult};

/// Session lifetime. Tokens are stateless; there is no revocation list.
const TOKEN_LIFETIME_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub username: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration (Unix timestamp)
    pub exp: u64,
}

/// Sign a session token for a user. A signing failure is a configuration
/// problem (bad secret); it surfaces as an unauthenticated response rather
/// than silently dropping the session.
pub fn issue(secret: &str, user_id: &str, username: &str) -> AppResult<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .as_secs();

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };

    let key = EncodingKey::from_secret(secret.as_ref());
    encode(&Header::default(), &claims, &key).map_err(|e| {
        tracing::error!("Token signing failed: {}", e);
        AppError::BadSession
    })
}

/// Verify and decode a session token. Structure, signature, and expiry are
/// all checked; any failure is `BadSession`.
pub fn verify(secret: &str, token: &str) -> AppResult<Claims> {
    let key = DecodingKey::from_secret(secret.as_ref());
    let data = decode::<Claims>(token, &key, &Validation::default())
        .map_err(|_| AppError::BadSession)?;
    Ok(data.claims)
}
