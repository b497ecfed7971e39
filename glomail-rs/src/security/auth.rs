//! Account authentication
//!
//! Accounts live in the [`MailboxStore`]: the mailbox directory is the
//! account, and its credential file holds an Argon2 PHC string.
//!
//! # Security
//! - Passwords hashed with Argon2 and a random salt
//! - Verification compares digests in constant time
//! - Usernames restricted to a filesystem-safe character set
//!
//! # Usage
//! ```no_run
//! use glomail_rs::config::Config;
//! use glomail_rs::security::Authenticator;
//! use glomail_rs::storage::MailboxStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let store = Arc::new(MailboxStore::new(&config.storage));
//! store.init().await?;
//!
//! let auth = Authenticator::new(store, &config.auth);
//! auth.register("alice", "LongEnough1").await?;
//! auth.login("alice", "LongEnough1").await?;
//! # Ok(())
//! # }
//! ```

use crate::config::AuthConfig;
use crate::error::{MailError, Result};
use crate::storage::MailboxStore;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Minimum password strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_digit: bool,
}

impl PasswordPolicy {
    pub fn check(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.min_length {
            return Err(MailError::InvalidCredentials(format!(
                "Password must be at least {} characters long",
                self.min_length
            )));
        }

        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(MailError::InvalidCredentials(
                "Password must contain an uppercase letter".to_string(),
            ));
        }

        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(MailError::InvalidCredentials(
                "Password must contain a digit".to_string(),
            ));
        }

        Ok(())
    }
}

impl From<&AuthConfig> for PasswordPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            min_length: config.min_password_length,
            require_uppercase: config.require_uppercase,
            require_digit: config.require_digit,
        }
    }
}

/// Registers and verifies accounts
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<MailboxStore>,
    policy: PasswordPolicy,
}

impl Authenticator {
    pub fn new(store: Arc<MailboxStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            policy: PasswordPolicy::from(config),
        }
    }

    /// Create a new account
    ///
    /// # Errors
    /// - `InvalidCredentials` for a disallowed username or a weak password
    /// - `AccountExists` when the mailbox directory is already there
    /// - `Storage` when the account could not be persisted (nothing is left behind)
    pub async fn register(&self, username: &str, password: &str) -> Result<()> {
        if self.store.is_reserved(username) {
            warn!("Registration refused: invalid username {:?}", username);
            return Err(MailError::InvalidCredentials(format!(
                "Username {:?} may only contain letters, digits, '_', '.' and '-'",
                username
            )));
        }

        self.policy.check(password)?;

        if self.store.account_exists(username).await? {
            warn!("Registration refused: {} already exists", username);
            return Err(MailError::AccountExists(username.to_string()));
        }

        let digest = Self::hash_password(password)?;
        self.store.create_account(username, &digest).await?;

        info!("Registered account {}", username);
        Ok(())
    }

    /// Verify an existing account's password
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        debug!("Authentication attempt for {}", username);

        if !self.store.account_exists(username).await? {
            warn!("Authentication failed: user not found: {}", username);
            return Err(MailError::UnknownUser(username.to_string()));
        }

        let digest = self.store.read_digest(username).await?;
        if !Self::verify_password(password, &digest)? {
            warn!("Authentication failed: invalid password for {}", username);
            return Err(MailError::BadPassword);
        }

        info!("Authentication successful for {}", username);
        Ok(())
    }

    pub async fn user_exists(&self, username: &str) -> Result<bool> {
        self.store.account_exists(username).await
    }

    /// Hash password with Argon2
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| MailError::Storage(format!("Failed to hash password: {}", e)))?;

        Ok(password_hash.to_string())
    }

    /// Check a password against a stored digest
    ///
    /// The digest comparison inside Argon2 verification is constant-time.
    pub fn verify_password(password: &str, digest: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(digest)
            .map_err(|e| MailError::Storage(format!("Corrupt credential record: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
