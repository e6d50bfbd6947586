//! Daemon: socket listener, notification bus, dispatch, store.
//!
//! This crate provides the meetpoint daemon that handles:
//! - Unix socket IPC for client communication
//! - Meeting-time resolution and per-owner persistence
//! - Real-time fan-out of scheduling events to subscribed observers
//! - Asynchronous email dispatch per delivered event
//!
//! # Example
//!
//! ```rust,no_run
//! use meetpoint_server::{ServerConfig, SocketServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = SocketServer::new(config).await?;
//!
//!     // Handle connections...
//!     Ok(())
//! }
//! ```

mod bus;
mod config;
mod dispatch;
mod error;
mod handler;
mod signals;
mod socket;
mod store;

pub use bus::{NotificationBus, ObserverId, Subscription};
pub use config::{ServerConfig, default_socket_path};
pub use dispatch::{EmailTransport, LoggingTransport, NotificationDispatcher, TransportError};
pub use error::{ServerError, ServerResult};
pub use handler::{
    RequestHandler, ServerState, SharedState, make_connection_handler, new_shared_state,
};
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
pub use socket::{Connection, SocketServer};
pub use store::{MeetingStore, MemoryStore, StoreError, StoreResult};
