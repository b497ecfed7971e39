//! Utility modules
//!
//! - [`email`]: address parsing and username validation

pub mod email;

pub use email::{is_valid_username, Address};
