use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::listener::BoxedWriter;

/// Registry key; assigned in accept order, never reused
pub type ConnectionId = u64;

/// Write side of one live client connection
pub struct Connection {
    id: ConnectionId,
    writer: Mutex<BoxedWriter>,
}

impl Connection {
    fn new(id: ConnectionId, writer: BoxedWriter) -> Self {
        Self {
            id,
            writer: Mutex::new(writer),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Write one complete line. Concurrent callers are serialised so lines
    /// from different broadcasts never interleave.
    pub async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}

struct Inner {
    next_id: ConnectionId,
    connections: HashMap<ConnectionId, Arc<Connection>>,
}

/// Thread-safe map of live connections
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_id: 1,
                connections: HashMap::new(),
            })),
        }
    }

    /// Add an accepted connection and watch it until it closes.
    ///
    /// The read half is drained in a background task; EOF or a transport
    /// error ends the watch and removes exactly this entry. Transport errors
    /// go no further than a debug log.
    pub async fn register<R, W>(&self, reader: R, writer: W) -> ConnectionId
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let id = {
            let mut inner = self.inner.lock().await;
            let id = inner.next_id;
            inner.next_id += 1;
            inner
                .connections
                .insert(id, Arc::new(Connection::new(id, Box::new(writer))));
            tracing::info!("Client {} connected. Total clients: {}", id, inner.connections.len());
            id
        };

        let registry = self.clone();
        tokio::spawn(async move {
            drain_until_closed(reader, id).await;
            registry.remove(id).await;
        });

        id
    }

    /// Remove a connection. Returns false if it was already gone.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.connections.remove(&id).is_some();
        if removed {
            tracing::info!("Client {} disconnected. Remaining: {}", id, inner.connections.len());
        }
        removed
    }

    /// Copy of the handles registered right now.
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.inner.lock().await.connections.values().cloned().collect()
    }

    /// Drop every handle, which shuts down the write side of each client.
    pub async fn clear(&self) {
        self.inner.lock().await.connections.clear();
    }

    pub async fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.inner.lock().await.connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.connections.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn drain_until_closed<R: AsyncRead + Unpin>(mut reader: R, id: ConnectionId) {
    let mut buf = [0u8; 512];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("Client {} transport error: {}", id, e);
                break;
            }
        }
    }
}
