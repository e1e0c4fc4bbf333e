use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::meta::Meta;

/// One log call's payload before it goes on the wire
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub level: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl LogRecord {
    pub fn new(level: impl Into<String>, message: impl Into<String>, meta: Option<Meta>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
            meta,
        }
    }

    /// Convert record to the wire line, newline included:
    /// `[<timestamp> ]<level>: <message>. <meta>\n`
    ///
    /// Falsy metadata (`null`, `false`, `0`, `''`) leaves the segment empty.
    pub fn to_line(&self, timestamp: Option<DateTime<Utc>>) -> String {
        let meta = self
            .meta
            .as_ref()
            .filter(|meta| !meta.is_falsy())
            .map(Meta::render)
            .unwrap_or_default();
        match timestamp {
            Some(ts) => format!(
                "{} {}: {}. {}\n",
                ts.to_rfc3339_opts(SecondsFormat::Millis, true),
                self.level,
                self.message,
                meta
            ),
            None => format!("{}: {}. {}\n", self.level, self.message, meta),
        }
    }

    /// JSON form, for callers that want the record rather than the line.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Published once per completed log call.
///
/// Counts are informational; the only guarantee is one event per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoggedEvent {
    pub targets: usize,
    pub failed: usize,
}

/// Fire-and-forget "logged" notifications.
#[derive(Clone, Debug)]
pub struct LoggedNotifier {
    tx: broadcast::Sender<LoggedEvent>,
}

impl LoggedNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Never blocks; with no subscribers the event is dropped.
    pub fn publish(&self, event: LoggedEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoggedEvent> {
        self.tx.subscribe()
    }
}
