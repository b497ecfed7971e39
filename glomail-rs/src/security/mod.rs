//! Security module
//!
//! - [`auth`]: account registration, password policy and verification

pub mod auth;

pub use auth::{Authenticator, PasswordPolicy};
