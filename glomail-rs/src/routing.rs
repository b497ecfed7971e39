//! Outgoing mail routing
//!
//! Only the local domain is served. Mail for a local account is delivered to
//! its mailbox, mail for an unknown local name goes to the lost-mail bin and
//! is reported as undeliverable, and anything else is refused outright since
//! no relay exists.

use crate::error::{MailError, Result};
use crate::protocol::Email;
use crate::storage::MailboxStore;
use crate::utils::Address;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where a destination address leads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Existing local account
    Local(String),
    /// Local domain, no such account
    Lost,
    /// Foreign domain
    External(String),
}

#[derive(Clone)]
pub struct Router {
    domain: String,
    store: Arc<MailboxStore>,
}

impl Router {
    pub fn new(store: Arc<MailboxStore>, domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            store,
        }
    }

    /// Address of a local account
    pub fn address_of(&self, username: &str) -> String {
        format!("{}@{}", username, self.domain)
    }

    /// Decide where an address leads
    pub async fn route(&self, address: &Address) -> Result<Route> {
        if !address.is_in_domain(&self.domain) {
            return Ok(Route::External(address.domain.clone()));
        }

        if self.store.account_exists(&address.local).await? {
            Ok(Route::Local(address.local.clone()))
        } else {
            Ok(Route::Lost)
        }
    }

    /// Route and store a mail
    ///
    /// # Errors
    /// - `InvalidAddress` when the destination cannot be parsed
    /// - `ExternalDomainRejected` for foreign domains, nothing is written
    /// - `UnknownRecipient` for unknown local names, after the lost-mail deposit
    /// - `Storage` when delivery to an existing account fails
    pub async fn send(&self, email: &Email) -> Result<PathBuf> {
        let destination = Address::parse(&email.destination)?;

        match self.route(&destination).await? {
            Route::Local(username) => self.store.deliver(&username, email).await,
            Route::Lost => {
                warn!(
                    "Unknown recipient {}, moving mail from {} to lost-mail bin",
                    destination, email.sender
                );
                if let Err(e) = self.store.deposit_lost(email).await {
                    error!("Failed to deposit lost mail for {}: {}", destination, e);
                }
                Err(MailError::UnknownRecipient(destination.to_string()))
            }
            Route::External(domain) => {
                info!(
                    "Rejected mail from {} to external domain {}",
                    email.sender, domain
                );
                Err(MailError::ExternalDomainRejected(destination.to_string()))
            }
        }
    }
}
