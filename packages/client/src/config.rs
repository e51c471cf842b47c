//! Client configuration, populated from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Default base address of the SafeTrack backend.
pub const DEFAULT_API_BASE: &str = "http://localhost:3000";

/// Default per-request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration for a SafeTrack client.
///
/// All fields can be populated from environment variables with defaults, so
/// a client works against a local backend with zero configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `SAFETRACK_API_BASE` | `http://localhost:3000` | Base address every request path is appended to |
/// | `SAFETRACK_TIMEOUT_SECS` | `30` | Upper bound on a single request, connect included |
/// | `SAFETRACK_SESSION_FILE` | `.safetrack/session.json` | Where a file-backed session store keeps its entries |
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address, without a trailing `/`.
    /// Example: `"http://localhost:3000"`.
    pub api_base: String,

    /// Requests that take longer than this fail with a network error
    /// instead of hanging their caller.
    pub timeout: Duration,

    /// Location of the durable session document.
    pub session_file: PathBuf,
}

impl ClientConfig {
    /// Configuration for `api_base` with every other setting at its default.
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            session_file: PathBuf::from(".safetrack").join("session.json"),
        }
    }

    /// Populate config from environment variables, applying defaults where absent.
    ///
    /// An unparsable `SAFETRACK_TIMEOUT_SECS` falls back to the default.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("SAFETRACK_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.into()),
        );

        if let Some(secs) = std::env::var("SAFETRACK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        if let Ok(path) = std::env::var("SAFETRACK_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }

        config
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_strips_trailing_slash() {
        assert_eq!(ClientConfig::new("http://host:3000/").api_base, "http://host:3000");
    }

    #[test]
    fn defaults() {
        let c = ClientConfig::default();
        assert_eq!(c.api_base, DEFAULT_API_BASE);
        assert_eq!(c.timeout, Duration::from_secs(30));
        assert!(c.session_file.ends_with("session.json"));
    }
}
