//! Authentication module for Craft Studio
//!
//! - Email and password accounts, bcrypt-hashed
//! - JWT access tokens
//! - Transparent upgrade of legacy plain-text credentials

mod jwt;
pub mod password;
mod service;

pub use jwt::{generate_access_token, get_user_id_from_claims, verify_token, Claims, JwtError};
pub use service::{AuthError, AuthService};
