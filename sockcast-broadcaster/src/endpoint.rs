//! Bind target for the socket server.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::BroadcasterError;

/// Default socket path used when nothing else is configured.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/sockcast.sock";

const TCP_SCHEME: &str = "tcp://";

/// Where the server listens: a Unix domain socket path or a TCP address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Filesystem path of a Unix domain socket
    Path(PathBuf),
    /// `host:port` TCP address
    Tcp(String),
}

impl Endpoint {
    pub fn path(path: impl AsRef<Path>) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }

    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::Tcp(addr.into())
    }

    /// Whether a failed probe should remove a stale file before binding.
    ///
    /// Only path endpoints leave files behind, so TCP addresses never unlink.
    pub fn unlink_on_retry(&self) -> bool {
        matches!(self, Self::Path(_))
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Tcp(_) => None,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::path(DEFAULT_SOCKET_PATH)
    }
}

impl FromStr for Endpoint {
    type Err = BroadcasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(BroadcasterError::InvalidEndpoint("empty endpoint".to_string()));
        }

        match s.strip_prefix(TCP_SCHEME) {
            Some(addr) => {
                let valid = addr
                    .rsplit_once(':')
                    .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                    .unwrap_or(false);
                if !valid {
                    return Err(BroadcasterError::InvalidEndpoint(format!(
                        "expected tcp://host:port, got {}",
                        s
                    )));
                }
                Ok(Self::tcp(addr))
            }
            None => Ok(Self::path(s)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Tcp(addr) => write!(f, "{}{}", TCP_SCHEME, addr),
        }
    }
}
