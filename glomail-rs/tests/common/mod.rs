//! Shared helpers for integration tests

#![allow(dead_code)]

use glomail_rs::client::MailClient;
use glomail_rs::config::Config;
use glomail_rs::server::MailServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const DOMAIN: &str = "glo2000.ca";
pub const PASSWORD: &str = "LongEnough1";

/// A server running on an ephemeral port with its own data directory
pub struct TestServer {
    pub addr: SocketAddr,
    pub config: Config,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<glomail_rs::Result<()>>>,
    _data: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let data = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.server.listen_addr = "127.0.0.1:0".to_string();
        config.server.domain = DOMAIN.to_string();
        config.storage.data_dir = data.path().join("data").to_string_lossy().to_string();

        let server = MailServer::new(config.clone());
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown, signal) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = signal.await;
        }));

        Self {
            addr,
            config,
            shutdown: Some(shutdown),
            handle: Some(handle),
            _data: data,
        }
    }

    pub async fn client(&self) -> MailClient {
        MailClient::connect(self.addr)
            .await
            .unwrap()
            .with_domain(DOMAIN)
    }

    /// A client already registered as `username`
    pub async fn registered(&self, username: &str) -> MailClient {
        let mut client = self.client().await;
        client.register(username, PASSWORD).await.unwrap();
        client
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.storage.data_dir)
    }

    pub fn mailbox_dir(&self, username: &str) -> PathBuf {
        self.data_dir().join(username)
    }

    pub fn lost_dir(&self) -> PathBuf {
        self.data_dir().join(&self.config.storage.lost_dir)
    }

    /// Stop the server and wait for the loop to exit
    pub async fn stop(mut self) -> glomail_rs::Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.handle.take().unwrap().await.unwrap()
    }
}

/// Number of entries in a directory
pub fn entry_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
