use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Bad password")]
    BadPassword,

    #[error("Invalid choice: {0}")]
    InvalidChoice(usize),

    #[error("External domain rejected: {0}")]
    ExternalDomainRejected(String),

    #[error("Unknown recipient: {0}")]
    UnknownRecipient(String),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// An `ERROR` response received by a client
    #[error("Server error: {0}")]
    Rejected(String),
}

impl MailError {
    /// Whether this error terminates the connection instead of being reported
    /// to the peer as an `ERROR` response.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::Transport(_) | Self::Unauthorized(_) | Self::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(MailError::Protocol("bad header".into()).is_fatal());
        assert!(MailError::Unauthorized("LIST".into()).is_fatal());
        assert!(MailError::Transport("reset".into()).is_fatal());

        assert!(!MailError::BadPassword.is_fatal());
        assert!(!MailError::Storage("disk full".into()).is_fatal());
        assert!(!MailError::InvalidChoice(0).is_fatal());
        assert!(!MailError::UnknownRecipient("ghost@glo2000.ca".into()).is_fatal());
    }

    #[test]
    fn test_error_messages_are_human_readable() {
        assert_eq!(
            MailError::AccountExists("alice".into()).to_string(),
            "Account already exists: alice"
        );
        assert_eq!(MailError::InvalidChoice(7).to_string(), "Invalid choice: 7");
    }
}
