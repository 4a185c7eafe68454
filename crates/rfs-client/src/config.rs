//! Client configuration.

use crate::reconcile::{DEFAULT_CHURN_DELAY, DEFAULT_POLL_INTERVAL};
use crate::watcher::DEFAULT_DEBOUNCE;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SERVER: &str = "127.0.0.1:9000";
pub const DEFAULT_FILE: &str = "~/rfs/main.py";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address as `host:port`
    pub server: String,
    /// Local file kept in sync
    pub file_path: PathBuf,
    pub poll_interval: Duration,
    pub churn_delay: Duration,
    pub debounce: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            file_path: expand_tilde(Path::new(DEFAULT_FILE)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            churn_delay: DEFAULT_CHURN_DELAY,
            debounce: DEFAULT_DEBOUNCE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Sets the local file; a leading `~` is expanded to the home directory.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file_path = expand_tilde(path.as_ref());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_churn_delay(mut self, delay: Duration) -> Self {
        self.churn_delay = delay;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Replace a leading `~` with the user's home directory.
///
/// Paths without one, or a system with no home directory, are returned as is.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server, "127.0.0.1:9000");
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.churn_delay, Duration::from_millis(100));
        assert_eq!(config.debounce, Duration::from_millis(200));
        assert!(config.file_path.ends_with("rfs/main.py"));
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/rfs/x.py")), home.join("rfs/x.py"));
            assert_eq!(expand_tilde(Path::new("~")), home);
        }
    }

    #[test]
    fn test_expand_tilde_leaves_other_paths() {
        assert_eq!(expand_tilde(Path::new("/tmp/x.py")), PathBuf::from("/tmp/x.py"));
        assert_eq!(expand_tilde(Path::new("~user/x")), PathBuf::from("~user/x"));
    }
}
