//! Unix socket listener for IPC.
//!
//! Async Unix socket server handling client connections with the meetpoint
//! protocol. A connection is request/response until it sends `Subscribe`,
//! after which the handler takes the stream over for event delivery.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

use meetpoint_protocol::{
    Envelope, MAX_MESSAGE_SIZE, PROTOCOL_VERSION, ProtocolError, Request, Response,
};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};

/// Unix socket server for handling client connections.
pub struct SocketServer {
    /// Server configuration.
    config: ServerConfig,
    /// Unix socket listener.
    listener: UnixListener,
    /// Semaphore for limiting concurrent connections.
    connection_semaphore: Arc<Semaphore>,
}

impl SocketServer {
    /// Creates a new socket server with the given configuration.
    ///
    /// Binds to the configured socket path. If `cleanup_stale_socket` is
    /// true, a dead socket file left by a previous run is removed before
    /// binding; a live socket means another server owns the path.
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let socket_path = &config.socket_path;

        if let Some(parent) = socket_path.parent()
            && !parent.exists()
        {
            return Err(ServerError::socket_path_invalid(
                parent.to_string_lossy().to_string(),
            ));
        }

        if config.cleanup_stale_socket && socket_path.exists() {
            // Connect to find out whether the socket is live
            match tokio::net::UnixStream::connect(socket_path).await {
                Ok(_) => {
                    return Err(ServerError::socket_in_use(
                        socket_path.to_string_lossy().to_string(),
                    ));
                }
                Err(_) => {
                    info!(
                        path = %socket_path.display(),
                        "Removing stale socket"
                    );
                    std::fs::remove_file(socket_path)?;
                }
            }
        } else if socket_path.exists() {
            return Err(ServerError::socket_in_use(
                socket_path.to_string_lossy().to_string(),
            ));
        }

        let listener = UnixListener::bind(socket_path)?;
        info!(
            path = %socket_path.display(),
            "Socket server listening"
        );

        let connection_semaphore = Arc::new(Semaphore::new(config.max_connections));

        Ok(Self {
            config,
            listener,
            connection_semaphore,
        })
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Accepts a single connection.
    pub async fn accept(&self) -> ServerResult<Connection> {
        let permit = self.connection_semaphore.clone().acquire_owned().await;
        let permit = permit.expect("semaphore should not be closed");

        let (stream, _addr) = self.listener.accept().await?;
        debug!("Accepted new connection");

        Ok(Connection {
            stream,
            timeout: self.config.connection_timeout,
            _permit: permit,
        })
    }

    /// Runs the server accept loop, calling the handler for each connection.
    ///
    /// Runs indefinitely; accept errors are logged and the loop continues.
    pub async fn run<F, Fut>(&self, handler: F) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        loop {
            match self.accept().await {
                Ok(connection) => {
                    let fut = handler(connection);
                    tokio::spawn(fut);
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Runs the server accept loop with a shutdown signal.
    ///
    /// The server stops when the shutdown future completes.
    pub async fn run_until_shutdown<F, Fut, S>(&self, handler: F, shutdown: S) -> ServerResult<()>
    where
        F: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
        S: std::future::Future<Output = ()> + Send,
    {
        tokio::select! {
            result = self.run(handler) => result,
            _ = shutdown => {
                info!("Shutdown signal received");
                Ok(())
            }
        }
    }
}

impl Drop for SocketServer {
    fn drop(&mut self) {
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!(
                    path = %self.config.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            } else {
                debug!(
                    path = %self.config.socket_path.display(),
                    "Removed socket file"
                );
            }
        }
    }
}

/// A client connection to the server.
pub struct Connection {
    stream: UnixStream,
    timeout: std::time::Duration,
    _permit: OwnedSemaphorePermit,
}

impl Connection {
    /// Reads a request envelope from the connection.
    ///
    /// Returns `Ok(None)` if the connection was closed cleanly.
    pub async fn read_request(&mut self) -> ServerResult<Option<Envelope<Request>>> {
        // Read length prefix (4 bytes, big-endian)
        let mut len_buf = [0u8; 4];
        match tokio::time::timeout(self.timeout, self.stream.read_exact(&mut len_buf)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ServerError::Protocol(ProtocolError::Timeout {
                    operation: "read request length".to_string(),
                }));
            }
        }

        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_MESSAGE_SIZE as usize {
            return Err(ServerError::Protocol(ProtocolError::MessageTooLarge {
                size: len as u32,
                max: MAX_MESSAGE_SIZE,
            }));
        }

        if len == 0 {
            return Err(ServerError::Protocol(ProtocolError::EmptyMessage));
        }

        // Read payload
        let mut payload = vec![0u8; len];
        match tokio::time::timeout(self.timeout, self.stream.read_exact(&mut payload)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ServerError::Protocol(ProtocolError::Timeout {
                    operation: "read request payload".to_string(),
                }));
            }
        }

        let envelope: Envelope<Request> =
            serde_json::from_slice(&payload).map_err(meetpoint_protocol::ProtocolError::from)?;

        if !envelope.is_compatible() {
            warn!(
                version = %envelope.protocol_version,
                expected = %PROTOCOL_VERSION,
                "Incompatible protocol version"
            );
        }

        Ok(Some(envelope))
    }

    /// Writes a response envelope to the connection.
    pub async fn write_response(&mut self, envelope: &Envelope<Response>) -> ServerResult<()> {
        let json =
            serde_json::to_vec(envelope).map_err(meetpoint_protocol::ProtocolError::from)?;

        let len = json.len() as u32;
        if len > MAX_MESSAGE_SIZE {
            return Err(ServerError::Protocol(ProtocolError::MessageTooLarge {
                size: len,
                max: MAX_MESSAGE_SIZE,
            }));
        }

        let mut buffer = Vec::with_capacity(4 + json.len());
        buffer.extend_from_slice(&len.to_be_bytes());
        buffer.extend_from_slice(&json);

        match tokio::time::timeout(self.timeout, self.stream.write_all(&buffer)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(ServerError::Protocol(ProtocolError::Timeout {
                    operation: "write response".to_string(),
                }));
            }
        }

        Ok(())
    }

    /// Sends a response for the given request.
    pub async fn respond(
        &mut self,
        request_id: impl Into<String>,
        response: Response,
    ) -> ServerResult<()> {
        let envelope = Envelope::response(request_id, response);
        self.write_response(&envelope).await
    }

    /// Takes the connection apart for streaming delivery.
    ///
    /// The permit must stay alive as long as the stream does — it is what
    /// counts this connection against the server's limit.
    pub fn into_parts(self) -> (UnixStream, OwnedSemaphorePermit) {
        (self.stream, self._permit)
    }
}
