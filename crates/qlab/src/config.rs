//! Client configuration, read from flags with environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Settings shared by every command.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL; endpoint paths are appended to it
    #[arg(long, env = "QLAB_BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: Url,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "QLAB_TIMEOUT_MS", default_value_t = 10_000)]
    pub timeout_ms: u64,

    /// File the session is persisted to
    #[arg(long, env = "QLAB_STORE", default_value = "./.qlab/session.json")]
    pub store: PathBuf,

    /// Mirror log records to the backend's log collector
    #[arg(long, env = "QLAB_SHIP_LOGS")]
    pub ship_logs: bool,
}

impl ClientConfig {
    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        config: ClientConfig,
    }

    #[test]
    fn defaults() {
        let cfg = Harness::try_parse_from(["qlab"]).unwrap().config;
        // Skip the assertion if the environment overrides the default.
        if std::env::var_os("QLAB_BASE_URL").is_none() {
            assert_eq!(cfg.base_url.as_str(), "http://localhost:8000/");
        }
        if std::env::var_os("QLAB_TIMEOUT_MS").is_none() {
            assert_eq!(cfg.timeout(), Duration::from_secs(10));
        }
    }

    #[test]
    fn flags_override() {
        let cfg = Harness::try_parse_from([
            "qlab",
            "--base-url",
            "https://api.example.com/backend/",
            "--timeout-ms",
            "250",
            "--store",
            "/tmp/s.json",
            "--ship-logs",
        ])
        .unwrap()
        .config;
        assert_eq!(cfg.base_url.path(), "/backend/");
        assert_eq!(cfg.timeout(), Duration::from_millis(250));
        assert_eq!(cfg.store, PathBuf::from("/tmp/s.json"));
        assert!(cfg.ship_logs);
    }

    #[test]
    fn rejects_bad_url() {
        assert!(Harness::try_parse_from(["qlab", "--base-url", "not a url"]).is_err());
    }
}
