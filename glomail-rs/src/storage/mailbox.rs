use crate::config::StorageConfig;
use crate::error::{MailError, Result};
use crate::protocol::Email;
use crate::utils::is_valid_username;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, error, info, warn};

const MAIL_EXTENSION: &str = ".json";

/// One line of a mailbox listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSummary {
    /// Position in the listing (1-indexed, most recent first)
    pub index: usize,
    pub sender: String,
    pub subject: String,
    pub date: String,
}

impl fmt::Display for MailSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} - {} - {}",
            self.index, self.sender, self.subject, self.date
        )
    }
}

/// Aggregate mailbox usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailStats {
    pub count: usize,
    /// Sum of mail file sizes in bytes
    pub size: u64,
}

#[derive(Debug)]
struct MailEntry {
    path: PathBuf,
    name: String,
    modified: SystemTime,
    size: u64,
}

/// Filesystem mailbox store
///
/// ```text
/// <data_dir>/
///   alice/
///     passwd                      credential digest
///     1700000000000000000-ab12....json
///   LOST/                         mail for unknown local users
/// ```
#[derive(Debug, Clone)]
pub struct MailboxStore {
    base_path: PathBuf,
    lost_dir: String,
    password_file: String,
}

impl MailboxStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            base_path: PathBuf::from(&config.data_dir),
            lost_dir: config.lost_dir.clone(),
            password_file: config.password_file.clone(),
        }
    }

    pub fn lost_path(&self) -> PathBuf {
        self.base_path.join(&self.lost_dir)
    }

    fn mailbox_path(&self, username: &str) -> PathBuf {
        self.base_path.join(username)
    }

    /// Create the data directory and the lost-mail bin if missing
    pub async fn init(&self) -> Result<()> {
        for dir in [self.base_path.clone(), self.lost_path()] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                MailError::Storage(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        info!("Mailbox store ready at {}", self.base_path.display());
        Ok(())
    }

    /// Names that can never be accounts
    pub fn is_reserved(&self, username: &str) -> bool {
        username == self.lost_dir || !is_valid_username(username)
    }

    /// An account exists when its mailbox directory does
    pub async fn account_exists(&self, username: &str) -> Result<bool> {
        if self.is_reserved(username) {
            return Ok(false);
        }

        match fs::metadata(self.mailbox_path(username)).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a mailbox directory holding the credential digest
    ///
    /// If the digest cannot be written the directory is removed again, so a
    /// failed registration never leaves an account behind.
    pub async fn create_account(&self, username: &str, digest: &str) -> Result<()> {
        if self.is_reserved(username) {
            return Err(MailError::InvalidCredentials(format!(
                "{} is not an allowed username",
                username
            )));
        }

        let mailbox_path = self.mailbox_path(username);
        if let Err(e) = fs::create_dir(&mailbox_path).await {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                return Err(MailError::AccountExists(username.to_string()));
            }
            return Err(MailError::Storage(format!(
                "Failed to create mailbox for {}: {}",
                username, e
            )));
        }

        let password_path = mailbox_path.join(&self.password_file);
        if let Err(e) = fs::write(&password_path, digest).await {
            error!("Failed to store credentials for {}: {}", username, e);
            if let Err(cleanup) = fs::remove_dir_all(&mailbox_path).await {
                error!(
                    "Failed to roll back mailbox {}: {}",
                    mailbox_path.display(),
                    cleanup
                );
            }
            return Err(MailError::Storage(format!(
                "Failed to store credentials for {}: {}",
                username, e
            )));
        }

        info!("Created mailbox for {}", username);
        Ok(())
    }

    /// Read the stored credential digest of an account
    pub async fn read_digest(&self, username: &str) -> Result<String> {
        let password_path = self.mailbox_path(username).join(&self.password_file);
        fs::read_to_string(&password_path)
            .await
            .map(|digest| digest.trim().to_string())
            .map_err(|e| {
                MailError::Storage(format!("Failed to read credentials for {}: {}", username, e))
            })
    }

    /// All account names, sorted
    pub async fn list_accounts(&self) -> Result<Vec<String>> {
        let mut reader = fs::read_dir(&self.base_path).await?;
        let mut accounts = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if self.is_reserved(&name) || !entry.file_type().await?.is_dir() {
                continue;
            }
            accounts.push(name);
        }

        accounts.sort();
        Ok(accounts)
    }

    /// Mailbox summaries, most recent first
    pub async fn list(&self, username: &str) -> Result<Vec<MailSummary>> {
        let mails = self.mails(&self.mailbox_path(username)).await?;
        let mut summaries = Vec::with_capacity(mails.len());

        for (position, (_, email)) in mails.into_iter().enumerate() {
            summaries.push(MailSummary {
                index: position + 1,
                sender: email.sender,
                subject: email.subject,
                date: email.date,
            });
        }

        debug!("Listed {} mails for {}", summaries.len(), username);
        Ok(summaries)
    }

    /// Read the mail at a 1-based position of the listing order
    pub async fn read(&self, username: &str, index: usize) -> Result<Email> {
        let mut mails = self.mails(&self.mailbox_path(username)).await?;

        match index.checked_sub(1) {
            Some(i) if i < mails.len() => Ok(mails.swap_remove(i).1),
            _ => Err(MailError::InvalidChoice(index)),
        }
    }

    /// Count and total size of the stored mails
    pub async fn stats(&self, username: &str) -> Result<MailStats> {
        let mails = self.mails(&self.mailbox_path(username)).await?;

        Ok(MailStats {
            count: mails.len(),
            size: mails.iter().map(|(entry, _)| entry.size).sum(),
        })
    }

    /// Store a mail in an existing account's mailbox
    pub async fn deliver(&self, username: &str, email: &Email) -> Result<PathBuf> {
        let path = self.write_mail(&self.mailbox_path(username), email).await?;
        info!("Delivered mail from {} to {}", email.sender, username);
        Ok(path)
    }

    /// Store a mail in the lost-mail bin
    pub async fn deposit_lost(&self, email: &Email) -> Result<PathBuf> {
        let path = self.write_mail(&self.lost_path(), email).await?;
        info!(
            "Deposited mail from {} to {} in lost-mail bin",
            email.sender, email.destination
        );
        Ok(path)
    }

    async fn write_mail(&self, dir: &Path, email: &Email) -> Result<PathBuf> {
        let filename = Self::generate_filename(&email.sender);
        Self::write_mail_named(dir, &filename, email).await
    }

    async fn write_mail_named(dir: &Path, filename: &str, email: &Email) -> Result<PathBuf> {
        let path = dir.join(filename);

        if fs::try_exists(&path).await? {
            warn!(
                "Mail file {} already exists, treating as delivered",
                path.display()
            );
            return Ok(path);
        }

        let data = serde_json::to_vec_pretty(email)
            .map_err(|e| MailError::Storage(format!("Failed to serialize mail: {}", e)))?;

        // Write to a hidden temporary file first, listings ignore it
        let tmp_path = dir.join(format!(".{}.tmp", filename));
        fs::write(&tmp_path, &data).await.map_err(|e| {
            MailError::Storage(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MailError::Storage(format!(
                "Failed to store {}: {}",
                path.display(),
                e
            )));
        }

        Ok(path)
    }

    /// Mail files of a mailbox, most recent first
    async fn entries(&self, dir: &Path) -> Result<Vec<MailEntry>> {
        let mut reader = fs::read_dir(dir).await?;
        let mut entries = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == self.password_file || name.starts_with('.') || !name.ends_with(MAIL_EXTENSION)
            {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            entries.push(MailEntry {
                path: entry.path(),
                name,
                modified: metadata.modified()?,
                size: metadata.len(),
            });
        }

        // Filenames start with a nanosecond timestamp, so they settle mtime ties
        entries.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.name.cmp(&a.name))
        });

        Ok(entries)
    }

    /// Readable mails of a mailbox, in listing order; unreadable files are skipped
    async fn mails(&self, dir: &Path) -> Result<Vec<(MailEntry, Email)>> {
        let entries = self.entries(dir).await?;
        let mut mails = Vec::with_capacity(entries.len());

        for entry in entries {
            match Self::load(&entry.path).await {
                Ok(email) => mails.push((entry, email)),
                Err(e) => warn!("Skipping mail file: {}", e),
            }
        }

        Ok(mails)
    }

    async fn load(path: &Path) -> Result<Email> {
        let data = fs::read(path).await?;
        serde_json::from_slice(&data).map_err(|e| {
            MailError::Storage(format!("Corrupt mail file {}: {}", path.display(), e))
        })
    }

    /// Filename format: `<unix nanos>-<sender digest>.json`
    fn generate_filename(sender: &str) -> String {
        let now = chrono::Utc::now();
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros() * 1000);

        let digest = format!("{:x}", Sha256::digest(sender.as_bytes()));

        format!("{:020}-{}{}", nanos, &digest[..16], MAIL_EXTENSION)
    }
}
