//! Mail server event loop
//!
//! One task owns the listener and every open connection. It sleeps in a
//! single `select!` until the listener has a pending connection, a connection
//! has a complete frame (or failed), or shutdown is requested. Each frame is
//! decoded, dispatched and answered before the loop waits again, so no two
//! connections are ever serviced at the same time.

use crate::config::Config;
use crate::error::{MailError, Result};
use crate::protocol::transport::{self, FrameWriter};
use crate::protocol::{Request, Response};
use crate::server::dispatcher::{Dispatcher, Outcome};
use crate::server::session::{ConnectionId, SessionRegistry};
use crate::storage::MailboxStore;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use futures::SinkExt;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::StreamMap;
use tracing::{debug, error, info, warn};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// What a connection's read half produced
enum Inbound {
    Frame(BytesMut),
    Failed(std::io::Error),
    Closed,
}

type InboundStream = Pin<Box<dyn Stream<Item = Inbound> + Send>>;

/// Every open connection: read halves, write halves and sessions
struct Connections {
    sessions: SessionRegistry,
    readers: StreamMap<ConnectionId, InboundStream>,
    writers: HashMap<ConnectionId, FrameWriter>,
    max_frame_length: usize,
}

impl Connections {
    fn new(max_frame_length: usize) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            readers: StreamMap::new(),
            writers: HashMap::new(),
            max_frame_length,
        }
    }

    fn register(&mut self, socket: TcpStream, peer: SocketAddr) -> ConnectionId {
        let id = self.sessions.open(peer);
        let (reader, writer) = transport::split(socket, self.max_frame_length);

        // Yield a final marker so the loop sees the peer hang up
        let inbound = reader
            .map(|frame| match frame {
                Ok(frame) => Inbound::Frame(frame),
                Err(e) => Inbound::Failed(e),
            })
            .chain(stream::once(async { Inbound::Closed }));

        self.readers.insert(id, Box::pin(inbound));
        self.writers.insert(id, writer);
        id
    }

    /// Deregister a connection; dropping both halves closes the socket
    fn remove(&mut self, id: ConnectionId) {
        let peer = self.sessions.peer(id);
        self.readers.remove(&id);
        self.writers.remove(&id);
        if let Some(username) = self.sessions.close(id) {
            debug!("Dropped session of {} on connection {}", username, id);
        }
        debug!("Removed connection {} ({:?})", id, peer);
    }

    async fn send(&mut self, id: ConnectionId, response: &Response) -> Result<()> {
        let frame = response.encode()?;
        let writer = self
            .writers
            .get_mut(&id)
            .ok_or_else(|| MailError::Transport(format!("Connection {} is not open", id)))?;

        writer
            .send(frame)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))
    }

    async fn close_all(&mut self) {
        for (id, mut writer) in self.writers.drain() {
            if let Err(e) = SinkExt::<Bytes>::close(&mut writer).await {
                debug!("Error closing connection {}: {}", id, e);
            }
        }
        self.readers = StreamMap::new();
        self.sessions.clear_all();
    }

    fn len(&self) -> usize {
        self.sessions.open_count()
    }
}

/// Mail server
pub struct MailServer {
    config: Config,
    store: Arc<MailboxStore>,
    dispatcher: Dispatcher,
}

impl MailServer {
    /// Create a new mail server
    pub fn new(config: Config) -> Self {
        let store = Arc::new(MailboxStore::new(&config.storage));
        let dispatcher = Dispatcher::new(&config, Arc::clone(&store));

        Self {
            config,
            store,
            dispatcher,
        }
    }

    /// Bind the configured listening address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.server.listen_addr).await?;
        Ok(listener)
    }

    /// Serve until Ctrl+C
    pub async fn run(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves
    ///
    /// The listener and every connection are owned here and released when
    /// this returns, whichever way it returns.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.store.init().await?;

        info!(
            "🌐 Mail server for @{} listening on {}",
            self.config.server.domain,
            listener.local_addr()?
        );

        let mut connections = Connections::new(self.config.server.max_frame_length);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, closing {} connection(s)", connections.len());
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let id = connections.register(stream, peer);
                        info!("📨 New connection {} from {}", id, peer);
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        // Back off while the listener keeps failing
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some((id, inbound)) = connections.readers.next() => {
                    self.handle_inbound(&mut connections, id, inbound).await;
                }
            }
        }

        connections.close_all().await;
        info!("Mail server stopped");
        Ok(())
    }

    async fn handle_inbound(&self, connections: &mut Connections, id: ConnectionId, inbound: Inbound) {
        let frame = match inbound {
            Inbound::Frame(frame) => frame,
            Inbound::Failed(e) => {
                warn!("Transport error on connection {}: {}", id, e);
                connections.remove(id);
                return;
            }
            Inbound::Closed => {
                info!("Connection {} closed by peer", id);
                connections.remove(id);
                return;
            }
        };

        let request = match Request::decode(&frame) {
            Ok(request) => request,
            Err(e) => {
                warn!("Dropping connection {}: {}", id, e);
                connections.remove(id);
                return;
            }
        };

        match self
            .dispatcher
            .dispatch(&mut connections.sessions, id, request)
            .await
        {
            Outcome::Reply(response) => {
                if let Err(e) = connections.send(id, &response).await {
                    warn!("Failed to reply on connection {}: {}", id, e);
                    connections.remove(id);
                }
            }
            Outcome::NoReply => {}
            Outcome::Close => {
                info!("Connection {} said goodbye", id);
                connections.remove(id);
            }
            Outcome::Reject(e) => {
                warn!("Dropping connection {}: {}", id, e);
                connections.remove(id);
            }
        }
    }
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
