//! Mail server
//!
//! - [`event_loop`]: listener and connection multiplexing on one task
//! - [`dispatcher`]: request validation, authorization and handlers
//! - [`session`]: connection to identity registry

pub mod dispatcher;
pub mod event_loop;
pub mod session;

pub use dispatcher::{Dispatcher, Outcome};
pub use event_loop::MailServer;
pub use session::{ConnectionId, SessionRegistry, SessionState};
