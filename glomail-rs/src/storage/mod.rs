//! Mail storage
//!
//! Provides the filesystem mailbox store:
//! - [`mailbox`]: per-user directories holding a credential file and one
//!   JSON file per mail, plus a shared lost-mail bin

pub mod mailbox;

pub use mailbox::{MailStats, MailSummary, MailboxStore};
