//! Probe-before-bind startup protocol
//!
//! A previous instance of the server may still own the endpoint, or may have
//! died and left a stale socket file behind. The binder tells the two apart by
//! connecting as a client first:
//!
//! - probe connects: someone is serving. Nothing is removed and the bind is
//!   attempted anyway, so the OS rejects it (`AddrInUse`) and startup fails.
//!   There is no takeover.
//! - probe fails on a path endpoint: the file is stale. It is removed
//!   (errors ignored, it may not exist) and the path is bound.
//! - probe fails on a TCP endpoint: nobody listens. Bind directly.
//!
//! Bind errors are never retried.

use std::future::Future;
use std::io;
use std::path::Path;

use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

use crate::endpoint::Endpoint;
use crate::error::{BroadcasterError, Result};
use crate::listener::Listener;

/// Primitive operations the binding protocol is built from.
pub trait BindOps {
    type Listener;

    /// Connect to the endpoint as a client; `Ok` means something is listening.
    fn probe(&self, endpoint: &Endpoint) -> impl Future<Output = io::Result<()>> + Send;

    /// Remove a (possibly stale) socket file.
    fn remove(&self, path: &Path) -> impl Future<Output = io::Result<()>> + Send;

    /// Bind and listen on the endpoint.
    fn listen(&self, endpoint: &Endpoint) -> impl Future<Output = io::Result<Self::Listener>> + Send;
}

/// Real sockets and filesystem via tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBindOps;

impl BindOps for SystemBindOps {
    type Listener = Listener;

    async fn probe(&self, endpoint: &Endpoint) -> io::Result<()> {
        // The probe connection is dropped straight away.
        match endpoint {
            Endpoint::Path(path) => UnixStream::connect(path).await.map(drop),
            Endpoint::Tcp(addr) => TcpStream::connect(addr.as_str()).await.map(drop),
        }
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    async fn listen(&self, endpoint: &Endpoint) -> io::Result<Listener> {
        match endpoint {
            Endpoint::Path(path) => UnixListener::bind(path).map(Listener::Unix),
            Endpoint::Tcp(addr) => TcpListener::bind(addr.as_str()).await.map(Listener::Tcp),
        }
    }
}

/// Run the probe-before-bind protocol once and return the bound listener.
pub async fn resolve_listener<O: BindOps>(endpoint: &Endpoint, ops: &O) -> Result<O::Listener> {
    match ops.probe(endpoint).await {
        Ok(()) => {
            tracing::warn!("{} is already being served; not removing it", endpoint);
        }
        Err(e) => {
            tracing::debug!("Probe of {} failed ({}); nobody is listening", endpoint, e);
            if endpoint.unlink_on_retry() {
                if let Some(path) = endpoint.as_path() {
                    if let Err(e) = ops.remove(path).await {
                        tracing::debug!("Ignoring removal error for {}: {}", path.display(), e);
                    }
                }
            }
        }
    }

    ops.listen(endpoint)
        .await
        .map_err(|source| BroadcasterError::Bind {
            endpoint: endpoint.to_string(),
            source,
        })
}
