//! Stdin record parsing and forwarding

use anyhow::{Context, Result};
use serde::Deserialize;
use sockcast_broadcaster::{LogRecord, LogSink, Meta};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::level::Level;

/// Level used for plain-text lines and JSON records without one
pub const DEFAULT_INPUT_LEVEL: &str = "info";

#[derive(Deserialize)]
struct JsonRecord {
    #[serde(default)]
    level: Option<String>,
    message: String,
    #[serde(default)]
    meta: Option<serde_json::Value>,
}

/// Parse one input line.
///
/// `{"level": .., "message": .., "meta": {..}}` becomes a structured record;
/// anything else is a plain message at `info`. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty() {
        return None;
    }

    if trimmed.trim_start().starts_with('{') {
        match serde_json::from_str::<JsonRecord>(trimmed) {
            Ok(json) => {
                return Some(LogRecord::new(
                    json.level.unwrap_or_else(|| DEFAULT_INPUT_LEVEL.to_string()),
                    json.message,
                    json.meta.map(Meta::from),
                ));
            }
            Err(e) => debug!("Input is not a JSON record, sending as text: {}", e),
        }
    }

    Some(LogRecord::new(DEFAULT_INPUT_LEVEL, trimmed, None))
}

/// Totals for one forwarding run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ForwardStats {
    pub forwarded: usize,
    pub filtered: usize,
    /// Log calls where at least one client write failed
    pub partial: usize,
}

/// Forward every record from `reader` to `sink` until EOF.
///
/// Records more verbose than `threshold` are dropped. Unknown levels are
/// forwarded unchanged.
pub async fn forward<S, R>(sink: &S, reader: R, threshold: Level) -> Result<ForwardStats>
where
    S: LogSink,
    R: AsyncBufRead + Unpin,
{
    let mut stats = ForwardStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let Some(record) = parse_line(&line) else {
            continue;
        };

        if let Ok(level) = record.level.parse::<Level>() {
            if !level.passes(threshold) {
                stats.filtered += 1;
                continue;
            }
        }

        let delivery = sink.log(&record.level, &record.message, record.meta).await;
        stats.forwarded += 1;
        if !delivery.is_success() {
            warn!(
                "Record reached {} of {} clients",
                delivery.delivered(),
                delivery.targets()
            );
            stats.partial += 1;
        }
    }

    Ok(stats)
}
