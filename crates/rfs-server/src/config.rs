//! Server configuration.

use std::path::PathBuf;

/// Default listen port for the sync server.
pub const DEFAULT_PORT: u16 = 9000;

/// Where to listen and which file to serve.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface address to bind. "::" also accepts IPv4 where the OS maps it
    /// onto IPv6; "0.0.0.0" is IPv4 only.
    pub bind: String,
    /// TCP port
    pub port: u16,
    /// Path of the authoritative document on disk
    pub file_path: PathBuf,
}

impl ServerConfig {
    pub fn new(port: u16, file_path: impl Into<PathBuf>) -> Self {
        Self {
            port,
            file_path: file_path.into(),
            ..Self::default()
        }
    }

    /// Sets the interface address to bind.
    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    /// Socket address string suitable for `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        if self.bind.contains(':') {
            format!("[{}]:{}", self.bind, self.port)
        } else {
            format!("{}:{}", self.bind, self.port)
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "::".to_string(),
            port: DEFAULT_PORT,
            file_path: PathBuf::from("rfs.txt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_all_interfaces_dual_stack() {
        let config = ServerConfig::new(9000, "doc.txt");
        assert_eq!(config.listen_addr(), "[::]:9000");
    }

    #[test]
    fn test_listen_addr_ipv4_opt_out() {
        let config = ServerConfig::new(9100, "doc.txt").with_bind("0.0.0.0");
        assert_eq!(config.listen_addr(), "0.0.0.0:9100");
    }
}
