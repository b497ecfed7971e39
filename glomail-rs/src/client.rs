//! Protocol client
//!
//! A typed client for the framed JSON protocol. `ERROR` responses surface as
//! [`MailError::Rejected`] carrying the server's message.
//!
//! ```no_run
//! use glomail_rs::client::MailClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = MailClient::connect("127.0.0.1:14000").await?;
//! client.login("alice", "LongEnough1").await?;
//!
//! for line in client.list_mail().await? {
//!     println!("{}", line);
//! }
//!
//! client.bye().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{MailError, Result};
use crate::protocol::transport::framed;
use crate::protocol::{AuthPayload, Email, Request, Response, ResponsePayload};
use crate::storage::MailStats;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

pub struct MailClient {
    stream: Framed<TcpStream, LengthDelimitedCodec>,
    username: Option<String>,
    domain: Option<String>,
}

impl MailClient {
    /// Connect to a mail server
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;

        Ok(Self {
            stream: framed(stream, MAX_FRAME_LENGTH),
            username: None,
            domain: None,
        })
    }

    /// Domain used to build this client's own address
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Currently logged-in user, if any
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Send a raw frame
    pub async fn send_frame(&mut self, frame: Bytes) -> Result<()> {
        self.stream
            .send(frame)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))
    }

    /// Send a request without waiting for a response
    pub async fn send(&mut self, request: &Request) -> Result<()> {
        let frame = request.encode()?;
        self.send_frame(frame).await
    }

    /// Receive the next response; `None` once the server closed the connection
    pub async fn receive(&mut self) -> Result<Option<Response>> {
        match self.stream.next().await {
            Some(Ok(frame)) => Response::decode(&frame).map(Some),
            Some(Err(e)) => Err(MailError::Transport(e.to_string())),
            None => Ok(None),
        }
    }

    /// Send a request and wait for its response
    pub async fn request(&mut self, request: &Request) -> Result<Response> {
        self.send(request).await?;
        self.receive().await?.ok_or_else(|| {
            MailError::Transport(format!(
                "Connection closed while waiting for {} response",
                request.header()
            ))
        })
    }

    /// Send a request and unwrap an `OK` payload
    async fn call(&mut self, request: &Request) -> Result<Option<ResponsePayload>> {
        match self.request(request).await? {
            Response::Ok(payload) => Ok(payload),
            Response::Error(message) => Err(MailError::Rejected(message)),
        }
    }

    pub async fn register(&mut self, username: &str, password: &str) -> Result<()> {
        self.call(&Request::Register(AuthPayload {
            username: username.to_string(),
            password: password.to_string(),
        }))
        .await?;
        self.username = Some(username.to_string());
        Ok(())
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.call(&Request::Login(AuthPayload {
            username: username.to_string(),
            password: password.to_string(),
        }))
        .await?;
        self.username = Some(username.to_string());
        Ok(())
    }

    /// Drop the session; the server does not answer
    pub async fn logout(&mut self) -> Result<()> {
        self.send(&Request::Logout).await?;
        self.username = None;
        Ok(())
    }

    /// Say goodbye and close the connection
    pub async fn bye(mut self) -> Result<()> {
        self.send(&Request::Bye).await?;
        SinkExt::<Bytes>::close(&mut self.stream)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))
    }

    /// Mailbox summaries, most recent first
    pub async fn list_mail(&mut self) -> Result<Vec<String>> {
        match self.call(&Request::ListMail).await? {
            Some(ResponsePayload::EmailList { email_list }) => Ok(email_list),
            other => Err(unexpected("INBOX_READING_REQUEST", other)),
        }
    }

    /// Read a mail by its 1-based position in the listing
    pub async fn read_mail(&mut self, choice: usize) -> Result<Email> {
        match self.call(&Request::ReadMail { choice }).await? {
            Some(ResponsePayload::Email(email)) => Ok(email),
            other => Err(unexpected("INBOX_READING_CHOICE", other)),
        }
    }

    /// Send a mail dated now
    pub async fn send_mail(&mut self, destination: &str, subject: &str, content: &str) -> Result<()> {
        let sender = match (&self.username, &self.domain) {
            (Some(username), Some(domain)) => format!("{}@{}", username, domain),
            (Some(username), None) => username.clone(),
            (None, _) => String::new(),
        };

        self.call(&Request::SendMail(Email {
            sender,
            destination: destination.to_string(),
            subject: subject.to_string(),
            date: chrono::Utc::now().to_rfc2822(),
            content: content.to_string(),
        }))
        .await?;
        Ok(())
    }

    pub async fn stats(&mut self) -> Result<MailStats> {
        match self.call(&Request::Stats).await? {
            Some(ResponsePayload::Stats { count, size }) => Ok(MailStats { count, size }),
            other => Err(unexpected("STATS_REQUEST", other)),
        }
    }
}

fn unexpected(header: &str, payload: Option<ResponsePayload>) -> MailError {
    MailError::Protocol(format!("Unexpected {} response: {:?}", header, payload))
}
