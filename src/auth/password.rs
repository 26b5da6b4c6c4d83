use crate::error::AppResult;

/// Hash a plaintext password with bcrypt. The plaintext is never stored
/// or logged; the hash carries its own salt.
pub fn hash(plaintext: &str) -> AppResult<String> {
    Ok(bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)?)
}

/// Verify plaintext against a stored hash - constant-time via bcrypt.
/// A malformed hash counts as a failed verification, not an error.
pub fn verify(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}
