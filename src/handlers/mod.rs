//! API handlers for the Craft Studio backend

pub mod admin;
pub mod auth;
pub mod health;
pub mod marketplace;
pub mod payments;
pub mod subscriptions;

pub use crate::middleware::auth::{AdminUser, AuthenticatedUser, OptionalUser};
