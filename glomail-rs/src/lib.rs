//! glomail-rs: internal mail service
//!
//! A small mail server: one event loop multiplexes every client connection,
//! authenticates users against per-user mailbox directories, and lets
//! authenticated clients list, read, send and measure their mail.
//!
//! # Features
//!
//! - **Single-threaded event loop**: accept, read, dispatch and reply on one task
//! - **Framed JSON protocol**: length-prefixed `{header, payload}` envelopes
//! - **Security**: Argon2 password digests, strict protocol, auth-gated operations
//! - **Storage**: one directory per account, one file per mail
//!
//! # Example
//!
//! ```no_run
//! use glomail_rs::config::Config;
//! use glomail_rs::server::MailServer;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = MailServer::new(Config::default());
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling
//! - [`protocol`]: Wire messages and framing
//! - [`server`]: Event loop, dispatcher and session registry
//! - [`security`]: Account authentication
//! - [`storage`]: Mailbox storage
//! - [`routing`]: Local delivery decisions
//! - [`client`]: Protocol client
//! - [`utils`]: Address and username validation

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod routing;
pub mod security;
pub mod server;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{MailError, Result};
