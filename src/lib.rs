//! Craft Studio Backend Library
//!
//! Accounts, balances, subscriptions and AI quota for the Craft Studio
//! marketplace, served over HTTP by the `craft-studio-server` binary.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
