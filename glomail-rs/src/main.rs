use clap::Parser;
use glomail_rs::config::Config;
use glomail_rs::server::MailServer;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "glomail-rs")]
#[command(about = "Internal mail server", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening address, e.g. 127.0.0.1:14000
    #[arg(short, long)]
    listen: Option<String>,

    /// Root data directory holding the mailboxes
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Local mail domain
    #[arg(long)]
    domain: Option<String>,
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("glomail_rs={}", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "compact" {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(domain) = cli.domain {
        config.server.domain = domain;
    }

    init_logging(&config);

    info!("Starting glomail-rs v{}", env!("CARGO_PKG_VERSION"));
    match &cli.config {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No config file given, using defaults"),
    }
    info!("  Listening on: {}", config.server.listen_addr);
    info!("  Data directory: {}", config.storage.data_dir);
    info!("  Domain: {}", config.server.domain);

    MailServer::new(config).run().await?;

    Ok(())
}
