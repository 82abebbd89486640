/// Password hashing with bcrypt
use crate::error::{ServiceError, ServiceResult};

/// Hash a plaintext password
pub fn hash_password(password: &str, cost: u32) -> ServiceResult<String> {
    bcrypt::hash(password, cost)
        .map_err(|e| ServiceError::Internal(format!("Password hashing failed: {}", e)))
}

/// Compare a plaintext password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> ServiceResult<bool> {
    bcrypt::verify(password, hash)
        .map_err(|e| ServiceError::Internal(format!("Password verification failed: {}", e)))
}
