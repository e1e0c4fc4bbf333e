use std::future::Future;

use tokio::sync::broadcast;

use crate::broadcaster::{Delivery, SocketServer};
use crate::events::LoggedEvent;
use crate::meta::Meta;

/// Narrow interface a host logging pipeline plugs into.
pub trait LogSink: Send + Sync {
    /// Deliver one record; resolves once every target has settled.
    fn log(&self, level: &str, message: &str, meta: Option<Meta>) -> impl Future<Output = Delivery> + Send;

    /// One event per completed `log` call.
    fn on_logged(&self) -> broadcast::Receiver<LoggedEvent>;
}

impl LogSink for SocketServer {
    fn log(&self, level: &str, message: &str, meta: Option<Meta>) -> impl Future<Output = Delivery> + Send {
        SocketServer::log(self, level, message, meta)
    }

    fn on_logged(&self) -> broadcast::Receiver<LoggedEvent> {
        self.subscribe_logged()
    }
}
