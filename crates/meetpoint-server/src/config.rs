//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use meetpoint_core::{DstPolicy, Granularity, TimeResolver};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the Unix socket.
    pub socket_path: PathBuf,

    /// Connection timeout.
    pub connection_timeout: Duration,

    /// Maximum concurrent connections.
    pub max_connections: usize,

    /// Whether to remove a stale socket on startup.
    pub cleanup_stale_socket: bool,

    /// How resolution treats local times in a DST transition.
    pub dst_policy: DstPolicy,

    /// The resolution at which two instants count as equal.
    pub granularity: Granularity,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            connection_timeout: Duration::from_secs(30),
            max_connections: 100,
            cleanup_stale_socket: true,
            dst_policy: DstPolicy::default(),
            granularity: Granularity::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a new server configuration with the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Default::default()
        }
    }

    /// Builder: set connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Builder: set max connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Builder: set cleanup stale socket.
    pub fn with_cleanup_stale_socket(mut self, cleanup: bool) -> Self {
        self.cleanup_stale_socket = cleanup;
        self
    }

    /// Builder: set the DST transition policy.
    pub fn with_dst_policy(mut self, policy: DstPolicy) -> Self {
        self.dst_policy = policy;
        self
    }

    /// Builder: set the comparison granularity.
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Builds the resolver this configuration describes.
    pub fn resolver(&self) -> TimeResolver {
        TimeResolver::new()
            .with_dst_policy(self.dst_policy)
            .with_granularity(self.granularity)
    }
}

/// Returns the default socket path.
///
/// Uses `$XDG_RUNTIME_DIR/meetpoint.sock` if available,
/// otherwise falls back to `/tmp/meetpoint-$UID.sock`.
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("meetpoint.sock")
    } else {
        #[cfg(unix)]
        let uid = unsafe { libc::getuid() };
        #[cfg(not(unix))]
        let uid = 0;
        PathBuf::from(format!("/tmp/meetpoint-{}.sock", uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert!(config.socket_path.to_string_lossy().contains("meetpoint"));
        assert_eq!(config.connection_timeout, Duration::from_secs(30));
        assert_eq!(config.max_connections, 100);
        assert!(config.cleanup_stale_socket);
        assert_eq!(config.dst_policy, DstPolicy::Earlier);
        assert_eq!(config.granularity, Granularity::Minute);
    }

    #[test]
    fn custom_config() {
        let config = ServerConfig::new("/custom/path.sock")
            .with_connection_timeout(Duration::from_secs(60))
            .with_max_connections(50)
            .with_cleanup_stale_socket(false)
            .with_dst_policy(DstPolicy::Reject)
            .with_granularity(Granularity::Second);

        assert_eq!(config.socket_path, PathBuf::from("/custom/path.sock"));
        assert_eq!(config.connection_timeout, Duration::from_secs(60));
        assert_eq!(config.max_connections, 50);
        assert!(!config.cleanup_stale_socket);
        assert_eq!(config.dst_policy, DstPolicy::Reject);
    }

    #[test]
    fn resolver_carries_the_configured_policy() {
        let config = ServerConfig::default().with_dst_policy(DstPolicy::Later);
        assert_eq!(config.resolver().dst_policy(), DstPolicy::Later);
    }

    #[test]
    fn default_socket_path_format() {
        let path = default_socket_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("meetpoint"));
        assert!(path_str.ends_with(".sock"));
    }
}
