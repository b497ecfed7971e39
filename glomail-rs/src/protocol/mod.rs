//! Client/server protocol
//!
//! - [`message`]: JSON envelopes and the typed request/response enums
//! - [`transport`]: length-delimited framing over TCP

pub mod message;
pub mod transport;

pub use message::{headers, AuthPayload, Email, Request, Response, ResponsePayload};
pub use transport::{FrameReader, FrameWriter};
