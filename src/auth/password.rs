//! Credential hashing and verification
//!
//! New credentials are bcrypt hashes. Accounts imported from the previous
//! store may still carry plain text; those are compared in constant time and
//! flagged so the caller can upgrade them.

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

impl From<bcrypt::BcryptError> for PasswordError {
    fn from(e: bcrypt::BcryptError) -> Self {
        PasswordError::HashingFailed(e.to_string())
    }
}

/// Outcome of checking a password against a stored credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    Valid,
    /// Matched a legacy plain-text credential that should be re-hashed
    ValidLegacy,
    Invalid,
}

impl CredentialCheck {
    pub fn is_valid(&self) -> bool {
        !matches!(self, CredentialCheck::Invalid)
    }
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// bcrypt hashes are 60 characters in modular crypt format
pub fn is_bcrypt_hash(stored: &str) -> bool {
    stored.len() == 60
        && ["$2a$", "$2b$", "$2x$", "$2y$"]
            .iter()
            .any(|prefix| stored.starts_with(prefix))
}

pub fn verify_password(password: &str, stored: &str) -> Result<CredentialCheck, PasswordError> {
    if is_bcrypt_hash(stored) {
        return Ok(if bcrypt::verify(password, stored)? {
            CredentialCheck::Valid
        } else {
            CredentialCheck::Invalid
        });
    }

    if !stored.is_empty() && constant_time_eq(password.as_bytes(), stored.as_bytes()) {
        Ok(CredentialCheck::ValidLegacy)
    } else {
        Ok(CredentialCheck::Invalid)
    }
}

/// Compares fixed-length digests so timing reveals neither content nor length
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let left = Sha256::digest(a);
    let right = Sha256::digest(b);

    left.iter()
        .zip(right.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
