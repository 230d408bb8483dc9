use bcrypt::{hash, verify};

use crate::error::{AppError, FieldError};

/// Salted one-way password hashing with a configurable bcrypt cost.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        hash(password, self.cost)
            .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
    }

    /// bcrypt compares digests in constant time.
    pub fn verify_password(&self, password: &str, hashed_password: &str) -> Result<bool, AppError> {
        verify(password, hashed_password)
            .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
    }
}

/// Strength rules for new passwords.
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl PasswordPolicy {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// Returns one `FieldError` per broken rule, reported under `field`.
    pub fn check(&self, field: &str, password: &str) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if password.chars().count() < self.min_length {
            errors.push(FieldError::new(
                field,
                format!("Password must be at least {} characters long", self.min_length),
            ));
        }
        if !password.chars().any(|c| c.is_uppercase()) {
            errors.push(FieldError::new(
                field,
                "Password must contain at least one uppercase letter",
            ));
        }
        if !password.chars().any(|c| c.is_lowercase()) {
            errors.push(FieldError::new(
                field,
                "Password must contain at least one lowercase letter",
            ));
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push(FieldError::new(field, "Password must contain at least one digit"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
