use std::io;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};

/// Read half of an accepted connection
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of an accepted connection
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Bound listening socket, either flavour
#[derive(Debug)]
pub enum Listener {
    Unix(UnixListener),
    Tcp(TcpListener),
}

impl Listener {
    /// Accept the next client and split it into independent halves.
    pub async fn accept(&self) -> io::Result<(BoxedReader, BoxedWriter)> {
        match self {
            Self::Unix(listener) => {
                let (stream, _addr) = listener.accept().await?;
                let (read, write) = stream.into_split();
                Ok((Box::new(read), Box::new(write)))
            }
            Self::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                tracing::debug!("Accepted TCP client from {}", addr);
                let (read, write) = stream.into_split();
                Ok((Box::new(read), Box::new(write)))
            }
        }
    }

    /// Human-readable bound address (resolves `:0` TCP ports).
    pub fn local_addr(&self) -> io::Result<String> {
        match self {
            Self::Unix(listener) => {
                let addr = listener.local_addr()?;
                Ok(addr
                    .as_pathname()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(unnamed)".to_string()))
            }
            Self::Tcp(listener) => Ok(format!("tcp://{}", listener.local_addr()?)),
        }
    }
}
