//! Wire messages
//!
//! Every frame carries one JSON envelope:
//!
//! ```text
//! {"header": "AUTH_LOGIN", "payload": {"username": "alice", "password": "..."}}
//! ```
//!
//! Inbound headers are decoded into the closed [`Request`] enum, outbound
//! headers into [`Response`]. Anything that does not fit exactly is a
//! [`MailError::Protocol`].

use crate::error::{MailError, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Header tags
pub mod headers {
    pub const AUTH_REGISTER: &str = "AUTH_REGISTER";
    pub const AUTH_LOGIN: &str = "AUTH_LOGIN";
    pub const AUTH_LOGOUT: &str = "AUTH_LOGOUT";
    pub const BYE: &str = "BYE";
    pub const INBOX_READING_REQUEST: &str = "INBOX_READING_REQUEST";
    pub const INBOX_READING_CHOICE: &str = "INBOX_READING_CHOICE";
    pub const EMAIL_SENDING: &str = "EMAIL_SENDING";
    pub const STATS_REQUEST: &str = "STATS_REQUEST";
    pub const OK: &str = "OK";
    pub const ERROR: &str = "ERROR";
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    header: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

impl Envelope {
    fn parse(frame: &[u8]) -> Result<Self> {
        serde_json::from_slice(frame)
            .map_err(|e| MailError::Protocol(format!("Malformed envelope: {}", e)))
    }

    fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decode the payload of a tag that requires one
    fn payload<T: DeserializeOwned>(self) -> Result<T> {
        let Some(value) = self.payload else {
            return Err(MailError::Protocol(format!(
                "{} requires a payload",
                self.header
            )));
        };

        serde_json::from_value(value)
            .map_err(|e| MailError::Protocol(format!("Bad {} payload: {}", self.header, e)))
    }

    /// Check that a payload-less tag really carries nothing
    fn empty(self) -> Result<()> {
        match self.payload {
            None | Some(Value::Null) => Ok(()),
            Some(_) => Err(MailError::Protocol(format!(
                "{} does not take a payload",
                self.header
            ))),
        }
    }
}

/// Credentials for `AUTH_REGISTER` and `AUTH_LOGIN`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthPayload {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for AuthPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthPayload")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A mail record, as sent by `EMAIL_SENDING`, stored on disk and returned
/// by `INBOX_READING_CHOICE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Email {
    pub sender: String,
    pub destination: String,
    pub subject: String,
    pub date: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChoicePayload {
    choice: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ErrorPayload {
    error_message: String,
}

/// Inbound request from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// AUTH_REGISTER - Create an account and log in
    Register(AuthPayload),
    /// AUTH_LOGIN - Authenticate
    Login(AuthPayload),
    /// AUTH_LOGOUT - Drop the identity, keep the connection
    Logout,
    /// BYE - Close the connection
    Bye,
    /// INBOX_READING_REQUEST - List mailbox summaries
    ListMail,
    /// INBOX_READING_CHOICE - Read one mail by 1-based index
    ReadMail { choice: usize },
    /// EMAIL_SENDING - Send a mail
    SendMail(Email),
    /// STATS_REQUEST - Mailbox count and size
    Stats,
}

impl Request {
    /// Decode one frame into a request
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let envelope = Envelope::parse(frame)?;
        let header = envelope.header.clone();

        let request = match header.as_str() {
            headers::AUTH_REGISTER => Request::Register(envelope.payload()?),
            headers::AUTH_LOGIN => Request::Login(envelope.payload()?),
            headers::AUTH_LOGOUT => envelope.empty().map(|_| Request::Logout)?,
            headers::BYE => envelope.empty().map(|_| Request::Bye)?,
            headers::INBOX_READING_REQUEST => envelope.empty().map(|_| Request::ListMail)?,
            headers::INBOX_READING_CHOICE => {
                let ChoicePayload { choice } = envelope.payload()?;
                Request::ReadMail { choice }
            }
            headers::EMAIL_SENDING => Request::SendMail(envelope.payload()?),
            headers::STATS_REQUEST => envelope.empty().map(|_| Request::Stats)?,
            other => {
                return Err(MailError::Protocol(format!(
                    "Unrecognized header: {}",
                    other
                )))
            }
        };

        Ok(request)
    }

    /// Encode this request as one frame
    pub fn encode(&self) -> Result<Bytes> {
        let payload = match self {
            Request::Register(auth) | Request::Login(auth) => Some(serde_json::to_value(auth)?),
            Request::ReadMail { choice } => {
                Some(serde_json::to_value(ChoicePayload { choice: *choice })?)
            }
            Request::SendMail(email) => Some(serde_json::to_value(email)?),
            Request::Logout | Request::Bye | Request::ListMail | Request::Stats => None,
        };

        Envelope {
            header: self.header().to_string(),
            payload,
        }
        .to_bytes()
    }

    /// Wire tag of this request
    pub fn header(&self) -> &'static str {
        match self {
            Request::Register(_) => headers::AUTH_REGISTER,
            Request::Login(_) => headers::AUTH_LOGIN,
            Request::Logout => headers::AUTH_LOGOUT,
            Request::Bye => headers::BYE,
            Request::ListMail => headers::INBOX_READING_REQUEST,
            Request::ReadMail { .. } => headers::INBOX_READING_CHOICE,
            Request::SendMail(_) => headers::EMAIL_SENDING,
            Request::Stats => headers::STATS_REQUEST,
        }
    }

    /// Whether the request is only valid on an authenticated connection
    pub fn requires_session(&self) -> bool {
        matches!(
            self,
            Request::Logout
                | Request::ListMail
                | Request::ReadMail { .. }
                | Request::SendMail(_)
                | Request::Stats
        )
    }
}

/// Payload of an `OK` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    EmailList { email_list: Vec<String> },
    Email(Email),
    Stats { count: usize, size: u64 },
}

/// Outbound response to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok(Option<ResponsePayload>),
    Error(String),
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(None)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }

    /// Encode this response as one frame
    pub fn encode(&self) -> Result<Bytes> {
        let envelope = match self {
            Response::Ok(payload) => Envelope {
                header: headers::OK.to_string(),
                payload: payload.as_ref().map(serde_json::to_value).transpose()?,
            },
            Response::Error(message) => Envelope {
                header: headers::ERROR.to_string(),
                payload: Some(serde_json::to_value(ErrorPayload {
                    error_message: message.clone(),
                })?),
            },
        };

        envelope.to_bytes()
    }

    /// Decode one frame into a response
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let envelope = Envelope::parse(frame)?;
        let header = envelope.header.clone();

        match header.as_str() {
            headers::OK => {
                if matches!(envelope.payload, None | Some(Value::Null)) {
                    Ok(Response::Ok(None))
                } else {
                    Ok(Response::Ok(Some(envelope.payload()?)))
                }
            }
            headers::ERROR => {
                let ErrorPayload { error_message } = envelope.payload()?;
                Ok(Response::Error(error_message))
            }
            other => Err(MailError::Protocol(format!(
                "Unrecognized response header: {}",
                other
            ))),
        }
    }
}
