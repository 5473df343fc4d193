use crate::error::AppError;
use bcrypt::{hash, verify, DEFAULT_COST};
use lazy_static::lazy_static;

lazy_static! {
    // Verified against when the username is unknown, so both login failures cost one
    // bcrypt round.
    static ref DUMMY_HASH: String = hash("taskdesk-dummy-password", DEFAULT_COST).unwrap_or_default();
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AppError> {
    verify(password, hashed_password)
        .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
}

/// Burns the same amount of work as a real verification and always reports a mismatch.
pub fn verify_against_dummy(password: &str) -> bool {
    let _ = verify(password, &DUMMY_HASH);
    false
}
