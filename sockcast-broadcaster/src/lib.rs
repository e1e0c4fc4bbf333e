//! Broadcast log sink over Unix or TCP sockets
//!
//! This crate provides a socket server that fans out every logged line to all
//! currently connected clients. Clients need no handshake: they connect and
//! read a stream of newline-terminated UTF-8 lines.
//!
//! # Features
//!
//! - Unix domain socket (default `/tmp/sockcast.sock`) or TCP endpoint
//! - Probe-before-bind startup: a stale socket file is removed, a live one is
//!   never taken over (startup fails instead)
//! - Concurrent fan-out; a log call completes once every client write settled
//! - Dead or slow clients only fail their own leg of a broadcast
//! - "logged" notification per completed call
//!
//! # Line format
//!
//! `[<timestamp> ]<level>: <message>. <metadata>\n`
//!
//! # Example Usage
//!
//! ```no_run
//! use sockcast_broadcaster::{Endpoint, Meta, SocketServer, SocketServerOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = SocketServer::new(SocketServerOptions::new(Endpoint::default()));
//!     server.start().await?;
//!
//!     let delivery = server
//!         .log("info", "cache warmed", Some(Meta::object([("entries", 512)])))
//!         .await;
//!     println!("delivered to {} clients", delivery.delivered());
//!
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod binder;
pub mod broadcaster;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod listener;
pub mod meta;
pub mod registry;
pub mod sink;

// Re-exports
pub use binder::{resolve_listener, BindOps, SystemBindOps};
pub use broadcaster::{Delivery, LegFailure, SocketServer, SocketServerOptions};
pub use endpoint::{Endpoint, DEFAULT_SOCKET_PATH};
pub use error::{BroadcasterError, Result};
pub use events::{LogRecord, LoggedEvent, LoggedNotifier};
pub use listener::Listener;
pub use meta::Meta;
pub use registry::{ConnectionId, ConnectionRegistry};
pub use sink::LogSink;
