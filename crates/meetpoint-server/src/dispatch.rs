//! Downstream dispatch of delivered events.
//!
//! Every event delivered to an observer is turned into exactly one email
//! dispatch attempt. The attempt runs on its own task so transport latency
//! or failure never delays the observer's delivery loop, the publisher, or
//! any other observer. Failures are logged and counted, never retried here —
//! retry policy, if any, belongs to the transport collaborator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use meetpoint_core::NotificationEvent;

/// Errors surfaced by the email transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport refused the message.
    #[error("message rejected: {reason}")]
    Rejected { reason: String },

    /// The transport could not be reached.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Outbound email boundary.
///
/// The real SMTP transport is an external collaborator; this trait is the
/// seam it plugs into. One call per dispatched event.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Sends one message to one recipient.
    async fn send(&self, recipient: &str, message: &str) -> Result<(), TransportError>;
}

/// Stand-in transport that records the send in the log and succeeds.
///
/// Used when the daemon runs without a wired transport.
#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait]
impl EmailTransport for LoggingTransport {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), TransportError> {
        info!(recipient = %recipient, message = %message, "email dispatched");
        Ok(())
    }
}

/// Turns each delivered [`NotificationEvent`] into one asynchronous email
/// dispatch.
///
/// At-least-once attempt per event per active observer; repeated identical
/// events are not deduplicated — each publish is independent.
pub struct NotificationDispatcher {
    transport: Arc<dyn EmailTransport>,
    attempts: AtomicU64,
    failures: AtomicU64,
}

impl NotificationDispatcher {
    /// Creates a dispatcher over the given transport.
    pub fn new(transport: Arc<dyn EmailTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// Triggers the email send for one delivered event.
    ///
    /// Returns the spawned task handle. The delivery path never awaits it;
    /// tests that need completion may.
    pub fn dispatch(self: &Arc<Self>, event: NotificationEvent) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.attempts.fetch_add(1, Ordering::Relaxed);
            match dispatcher
                .transport
                .send(&event.recipient, &event.payload)
                .await
            {
                Ok(()) => {
                    debug!(recipient = %event.recipient, kind = ?event.kind, "dispatch completed");
                }
                Err(e) => {
                    dispatcher.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        error = %e,
                        recipient = %event.recipient,
                        kind = ?event.kind,
                        "dispatch failed"
                    );
                }
            }
        })
    }

    /// Total dispatch attempts since startup.
    pub fn dispatch_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Failed dispatch attempts since startup.
    pub fn dispatch_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
