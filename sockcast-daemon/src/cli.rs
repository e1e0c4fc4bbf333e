use std::path::PathBuf;

use clap::Parser;

use crate::config::DaemonConfig;

/// Broadcast stdin log records to every client of a socket
#[derive(Parser, Debug)]
#[command(name = "sockcast-daemon", version, about)]
pub struct Args {
    /// Config file (default: <config dir>/sockcast/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Socket path or tcp://host:port
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Most verbose record level to forward
    #[arg(long)]
    pub level: Option<String>,

    /// Prefix lines with an ISO-8601 timestamp
    #[arg(long)]
    pub timestamp: bool,

    /// Diagnostics filter for the daemon's own logging
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Command-line values win over the config file.
    pub fn apply(&self, config: &mut DaemonConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(level) = &self.level {
            config.level = level.clone();
        }
        if self.timestamp {
            config.timestamp = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "sockcast-daemon",
            "--endpoint",
            "tcp://0.0.0.0:9999",
            "--level",
            "warn",
            "--timestamp",
        ]);
        let mut config = DaemonConfig::default();
        args.apply(&mut config);

        assert_eq!(config.endpoint, "tcp://0.0.0.0:9999");
        assert_eq!(config.level, "warn");
        assert!(config.timestamp);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let args = Args::parse_from(["sockcast-daemon"]);
        let mut config = DaemonConfig::default();
        args.apply(&mut config);

        assert_eq!(config.level, "silly");
        assert!(!config.timestamp);
        assert_eq!(args.log_level, "info");
    }
}
