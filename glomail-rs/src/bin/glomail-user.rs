//! CLI tool for managing mail accounts
//!
//! Works directly on the data directory, with the same username and password
//! rules as registration over the wire.
//!
//! # Usage
//!
//! ```bash
//! # Add a new user
//! glomail-user add alice LongEnough1 --data-dir server_data
//!
//! # List all users
//! glomail-user list --data-dir server_data
//!
//! # Check if user exists
//! glomail-user exists alice --data-dir server_data
//!
//! # Show mailbox usage
//! glomail-user stats alice --data-dir server_data
//! ```

use clap::{Parser, Subcommand};
use glomail_rs::config::Config;
use glomail_rs::security::Authenticator;
use glomail_rs::storage::MailboxStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "glomail-user")]
#[command(about = "Manage mail accounts", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root data directory, overrides the configuration
    #[arg(short, long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new user
    Add {
        /// Username
        username: String,
        /// User password
        password: String,
    },
    /// List all users
    List,
    /// Check if user exists
    Exists {
        /// Username
        username: String,
    },
    /// Show mail count and size of a mailbox
    Stats {
        /// Username
        username: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }

    let store = Arc::new(MailboxStore::new(&config.storage));
    store.init().await?;
    let auth = Authenticator::new(Arc::clone(&store), &config.auth);

    match cli.command {
        Commands::Add { username, password } => {
            println!("Adding user: {}", username);
            auth.register(&username, &password).await?;
            println!("✓ User {}@{} added successfully", username, config.server.domain);
        }
        Commands::List => {
            let accounts = store.list_accounts().await?;
            if accounts.is_empty() {
                println!("No users found");
            } else {
                println!("Users ({}):", accounts.len());
                for username in accounts {
                    println!("  {}", username);
                }
            }
        }
        Commands::Exists { username } => {
            if auth.user_exists(&username).await? {
                println!("✓ User {} exists", username);
            } else {
                println!("✗ User {} does not exist", username);
                std::process::exit(1);
            }
        }
        Commands::Stats { username } => {
            if !auth.user_exists(&username).await? {
                eprintln!("Error: User {} does not exist", username);
                std::process::exit(1);
            }
            let stats = store.stats(&username).await?;
            println!("{}: {} mail(s), {} bytes", username, stats.count, stats.size);
        }
    }

    Ok(())
}
