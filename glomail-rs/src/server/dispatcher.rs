//! Request dispatch
//!
//! Routes one decoded request of one connection to its handler and turns the
//! handler result into an [`Outcome`] for the event loop. Requests that need a
//! session on an anonymous connection are protocol violations and end the
//! connection.

use crate::config::Config;
use crate::error::{MailError, Result};
use crate::protocol::{AuthPayload, Email, Request, Response, ResponsePayload};
use crate::routing::Router;
use crate::security::Authenticator;
use crate::server::session::{ConnectionId, SessionRegistry};
use crate::storage::MailboxStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the event loop does after a request
#[derive(Debug)]
pub enum Outcome {
    /// Write this response back
    Reply(Response),
    /// Nothing to send, keep the connection
    NoReply,
    /// Client asked to leave
    Close,
    /// Protocol violation, drop without a reply
    Reject(MailError),
}

pub struct Dispatcher {
    auth: Authenticator,
    store: Arc<MailboxStore>,
    router: Router,
}

impl Dispatcher {
    pub fn new(config: &Config, store: Arc<MailboxStore>) -> Self {
        Self {
            auth: Authenticator::new(Arc::clone(&store), &config.auth),
            router: Router::new(Arc::clone(&store), config.server.domain.clone()),
            store,
        }
    }

    /// Handle one request from `conn`
    pub async fn dispatch(
        &self,
        sessions: &mut SessionRegistry,
        conn: ConnectionId,
        request: Request,
    ) -> Outcome {
        debug!(
            "Handling {} for connection {} in state {:?}",
            request.header(),
            conn,
            sessions.state(conn)
        );
        let identity = sessions.identity(conn).map(str::to_string);

        let result = match (request, identity) {
            (Request::Register(payload), _) => self.handle_register(sessions, conn, payload).await,
            (Request::Login(payload), _) => self.handle_login(sessions, conn, payload).await,
            (Request::Bye, _) => return Outcome::Close,
            (Request::Logout, Some(username)) => {
                sessions.clear(conn);
                info!("{} logged out on connection {}", username, conn);
                return Outcome::NoReply;
            }
            (Request::ListMail, Some(username)) => self.handle_list(&username).await,
            (Request::ReadMail { choice }, Some(username)) => {
                self.handle_read(&username, choice).await
            }
            (Request::SendMail(email), Some(username)) => self.handle_send(&username, email).await,
            (Request::Stats, Some(username)) => self.handle_stats(&username).await,
            (request, None) => Err(MailError::Unauthorized(format!(
                "{} requires an authenticated session",
                request.header()
            ))),
        };

        match result {
            Ok(payload) => Outcome::Reply(Response::Ok(payload)),
            Err(e) if e.is_fatal() => Outcome::Reject(e),
            Err(e) => {
                debug!("Request failed on connection {}: {}", conn, e);
                Outcome::Reply(Response::Error(e.to_string()))
            }
        }
    }

    async fn handle_register(
        &self,
        sessions: &mut SessionRegistry,
        conn: ConnectionId,
        payload: AuthPayload,
    ) -> Result<Option<ResponsePayload>> {
        self.auth.register(&payload.username, &payload.password).await?;
        sessions.bind(conn, &payload.username);
        Ok(None)
    }

    async fn handle_login(
        &self,
        sessions: &mut SessionRegistry,
        conn: ConnectionId,
        payload: AuthPayload,
    ) -> Result<Option<ResponsePayload>> {
        self.auth.login(&payload.username, &payload.password).await?;
        if let Some(previous) = sessions.identity(conn) {
            info!(
                "Connection {} switches identity from {} to {}",
                conn, previous, payload.username
            );
        }
        sessions.bind(conn, &payload.username);
        Ok(None)
    }

    async fn handle_list(&self, username: &str) -> Result<Option<ResponsePayload>> {
        let summaries = self.store.list(username).await?;
        Ok(Some(ResponsePayload::EmailList {
            email_list: summaries.iter().map(ToString::to_string).collect(),
        }))
    }

    async fn handle_read(&self, username: &str, choice: usize) -> Result<Option<ResponsePayload>> {
        let email = self.store.read(username, choice).await?;
        Ok(Some(ResponsePayload::Email(email)))
    }

    async fn handle_send(&self, username: &str, mut email: Email) -> Result<Option<ResponsePayload>> {
        // The sender is whoever is logged in, whatever the payload claims
        let sender = self.router.address_of(username);
        if email.sender != sender {
            warn!(
                "Rewriting sender {:?} to {} for {}",
                email.sender, sender, username
            );
            email.sender = sender;
        }

        if email.date.trim().is_empty() {
            email.date = chrono::Utc::now().to_rfc2822();
        }

        self.router.send(&email).await?;
        Ok(None)
    }

    async fn handle_stats(&self, username: &str) -> Result<Option<ResponsePayload>> {
        let stats = self.store.stats(username).await?;
        Ok(Some(ResponsePayload::Stats {
            count: stats.count,
            size: stats.size,
        }))
    }
}
