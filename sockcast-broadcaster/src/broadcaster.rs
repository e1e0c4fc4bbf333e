use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::{JoinHandle, JoinSet};

use crate::binder::{resolve_listener, BindOps, SystemBindOps};
use crate::endpoint::Endpoint;
use crate::error::{BroadcasterError, Result};
use crate::events::{LogRecord, LoggedEvent, LoggedNotifier};
use crate::listener::Listener;
use crate::meta::Meta;
use crate::registry::{ConnectionId, ConnectionRegistry};

const LOGGED_CHANNEL_CAPACITY: usize = 64;
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Construction options for [`SocketServer`]
#[derive(Debug, Clone)]
pub struct SocketServerOptions {
    pub endpoint: Endpoint,
    /// Minimum level; kept for the host framework, the server never filters
    pub level: String,
    pub name: String,
    /// Prefix every line with an ISO-8601 timestamp
    pub timestamp: bool,
    /// Restrict the socket file to its owner (0600) after binding
    pub secure: bool,
}

impl Default for SocketServerOptions {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            level: "silly".to_string(),
            name: "socket server".to_string(),
            timestamp: false,
            secure: true,
        }
    }
}

impl SocketServerOptions {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: bool) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

/// One failed leg of a broadcast
#[derive(Debug)]
pub struct LegFailure {
    pub connection: ConnectionId,
    pub error: io::Error,
}

/// Aggregate outcome of one log call
#[derive(Debug, Default)]
pub struct Delivery {
    targets: usize,
    failures: Vec<LegFailure>,
}

impl Delivery {
    /// Connections that were live when the call was made
    pub fn targets(&self) -> usize {
        self.targets
    }

    pub fn failures(&self) -> &[LegFailure] {
        &self.failures
    }

    pub fn delivered(&self) -> usize {
        self.targets - self.failures.len()
    }

    /// True when no leg failed (an empty broadcast succeeds).
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn event(&self) -> LoggedEvent {
        LoggedEvent {
            targets: self.targets,
            failed: self.failures.len(),
        }
    }

    /// Number of delivered legs, or `PartialDelivery` if any leg failed.
    pub fn into_result(self) -> Result<usize> {
        if self.is_success() {
            Ok(self.targets)
        } else {
            Err(BroadcasterError::PartialDelivery {
                failed: self.failures.len(),
                total: self.targets,
            })
        }
    }
}

struct Running {
    accept_task: JoinHandle<()>,
    /// Socket file this server bound, removed on stop/drop
    bound_path: Option<PathBuf>,
    local_addr: String,
}

/// Log sink that broadcasts every line to all connected socket clients
pub struct SocketServer {
    options: SocketServerOptions,
    registry: ConnectionRegistry,
    notifier: LoggedNotifier,
    state: Mutex<Option<Running>>,
}

impl SocketServer {
    /// Create new server (no I/O until [`start`](Self::start))
    pub fn new(options: SocketServerOptions) -> Self {
        Self {
            options,
            registry: ConnectionRegistry::new(),
            notifier: LoggedNotifier::new(LOGGED_CHANNEL_CAPACITY),
            state: Mutex::new(None),
        }
    }

    /// Bind the endpoint and start accepting clients
    pub async fn start(&self) -> Result<()> {
        self.start_with(&SystemBindOps).await
    }

    /// Same as [`start`](Self::start) with injected bind primitives
    pub async fn start_with<O>(&self, ops: &O) -> Result<()>
    where
        O: BindOps<Listener = Listener>,
    {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return Err(BroadcasterError::AlreadyRunning);
        }

        let endpoint = &self.options.endpoint;
        let listener = resolve_listener(endpoint, ops).await?;
        let bound_path = endpoint.as_path().map(Path::to_path_buf);

        // Set secure permissions (0600 = owner-only access)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let (true, Some(path)) = (self.options.secure, &bound_path) {
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
            }
        }

        let local_addr = listener
            .local_addr()
            .unwrap_or_else(|_| endpoint.to_string());
        tracing::info!("{} listening on {}", self.options.name, local_addr);

        let registry = self.registry.clone();
        let accept_task = tokio::spawn(accept_loop(listener, registry));

        *state = Some(Running {
            accept_task,
            bound_path,
            local_addr,
        });

        Ok(())
    }

    /// Stop accepting, disconnect clients and remove the socket file
    pub async fn stop(&self) -> Result<()> {
        let running = self
            .state
            .lock()
            .await
            .take()
            .ok_or(BroadcasterError::NotStarted)?;

        running.accept_task.abort();
        self.registry.clear().await;

        if let Some(path) = running.bound_path {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }

        tracing::info!("{} stopped", self.options.name);
        Ok(())
    }

    /// Broadcast one line to every client connected at call time.
    ///
    /// Waits until every leg has settled. Exactly one "logged" notification
    /// is published per call, whatever the outcome.
    pub async fn log(&self, level: &str, message: &str, meta: Option<Meta>) -> Delivery {
        self.log_record(&LogRecord::new(level, message, meta)).await
    }

    /// Callback form of [`log`](Self::log): `callback(error, success)` runs
    /// exactly once. Leg failures are reported through `success`, never as
    /// an error.
    pub async fn log_with<F>(&self, level: &str, message: &str, meta: Option<Meta>, callback: F)
    where
        F: FnOnce(Option<BroadcasterError>, bool),
    {
        let delivery = self.log(level, message, meta).await;
        callback(None, delivery.is_success());
    }

    pub async fn log_record(&self, record: &LogRecord) -> Delivery {
        let timestamp = self.options.timestamp.then(Utc::now);
        let line: Arc<str> = Arc::from(record.to_line(timestamp));

        let targets = self.registry.snapshot().await;
        if targets.is_empty() {
            let delivery = Delivery::default();
            self.notifier.publish(delivery.event());
            return delivery;
        }

        let total = targets.len();
        let mut pending: HashSet<ConnectionId> = targets.iter().map(|c| c.id()).collect();
        let mut legs = JoinSet::new();
        for connection in targets {
            let line = Arc::clone(&line);
            legs.spawn(async move {
                let result = connection.write_line(&line).await;
                (connection.id(), result)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = legs.join_next().await {
            match joined {
                Ok((id, result)) => {
                    pending.remove(&id);
                    if let Err(error) = result {
                        tracing::debug!("Write to client {} failed: {}", id, error);
                        failures.push(LegFailure { connection: id, error });
                    }
                }
                Err(e) => tracing::error!("Broadcast leg did not complete: {}", e),
            }
        }
        // Legs that never reported back (panicked or aborted)
        failures.extend(pending.into_iter().map(|id| LegFailure {
            connection: id,
            error: io::Error::new(io::ErrorKind::Other, "write task did not complete"),
        }));

        let delivery = Delivery {
            targets: total,
            failures,
        };
        if !delivery.is_success() {
            tracing::warn!(
                "Delivered to {} of {} clients",
                delivery.delivered(),
                delivery.targets()
            );
        }

        self.notifier.publish(delivery.event());
        delivery
    }

    /// Receive one [`LoggedEvent`] per completed log call
    pub fn subscribe_logged(&self) -> broadcast::Receiver<LoggedEvent> {
        self.notifier.subscribe()
    }

    /// Get current client count
    pub async fn client_count(&self) -> usize {
        self.registry.len().await
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.options.endpoint
    }

    pub fn level(&self) -> &str {
        &self.options.level
    }

    pub fn name(&self) -> &str {
        &self.options.name
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Address actually bound, once running
    pub async fn local_addr(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .as_ref()
            .map(|running| running.local_addr.clone())
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        // Only clean up a socket file this instance bound itself
        if let Some(running) = self.state.get_mut().take() {
            running.accept_task.abort();
            if let Some(path) = running.bound_path {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

async fn accept_loop(listener: Listener, registry: ConnectionRegistry) {
    loop {
        match listener.accept().await {
            Ok((reader, writer)) => {
                registry.register(reader, writer).await;
            }
            Err(e) => {
                tracing::error!("Failed to accept client: {}", e);
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}
