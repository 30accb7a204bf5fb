//! # mealbridge_core
//!
//! Credential and token core for Meal Bridge: password hashing, signed
//! tokens, account lockout, the request gate, and the role policy.

pub mod auth;
pub mod clock;
pub mod config;
pub mod models;
pub mod store;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
