use crate::error::{MailError, Result};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Usernames double as directory names: alphanumerics, `_`, `.` and `-` only
fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("username pattern is a valid regex")
    })
}

/// Check a username against the allowed character set
///
/// `.` and `..` match the character set but would escape the data directory,
/// so they are refused as well.
pub fn is_valid_username(username: &str) -> bool {
    username_pattern().is_match(username) && username != "." && username != ".."
}

/// A parsed `local@domain` address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub local: String,
    pub domain: String,
}

impl Address {
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();

        if address.is_empty() {
            return Err(MailError::InvalidAddress("Email is empty".to_string()));
        }

        let Some((local, domain)) = address.split_once('@') else {
            return Err(MailError::InvalidAddress(format!(
                "{} must contain @",
                address
            )));
        };

        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(MailError::InvalidAddress(format!(
                "{} is not a valid address",
                address
            )));
        }

        Ok(Self {
            local: local.to_string(),
            domain: domain.to_string(),
        })
    }

    /// Domain comparison is case-insensitive, the local part is not
    pub fn is_in_domain(&self, domain: &str) -> bool {
        self.domain.eq_ignore_ascii_case(domain)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}
