//! Request dispatch and the observer streaming loop.
//!
//! Routes incoming requests to the resolver, the store, and the bus.
//! A connection that sends `Subscribe` is taken over as an observer: it
//! receives one event frame per published scheduling event until disconnect,
//! and each delivered event also triggers that observer's email dispatch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use meetpoint_core::{
    MeetingProposal, NotificationEvent, ParticipantSlot, ResolvedMeeting, TimeResolver,
};
use meetpoint_protocol::{Envelope, ErrorCode, Request, Response, StatusInfo, encode_message};

use crate::bus::NotificationBus;
use crate::dispatch::NotificationDispatcher;
use crate::error::{ServerError, ServerResult};
use crate::signals::ShutdownHandle;
use crate::socket::Connection;
use crate::store::MeetingStore;

/// Server state shared across all connections.
#[derive(Debug)]
pub struct ServerState {
    /// Server start time.
    start_time: DateTime<Utc>,
    /// Whether shutdown has been requested.
    shutdown_requested: bool,
    /// Handle for stopping the accept loop, when wired.
    shutdown_handle: Option<ShutdownHandle>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    /// Creates a new server state.
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            shutdown_requested: false,
            shutdown_handle: None,
        }
    }

    /// Returns the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        let duration = Utc::now() - self.start_time;
        duration.num_seconds().max(0) as u64
    }

    /// Requests a shutdown, stopping the accept loop if a handle is wired.
    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
        if let Some(handle) = &self.shutdown_handle {
            handle.trigger();
        }
    }

    /// Returns true if shutdown has been requested.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Wires the shutdown handle used by `request_shutdown`.
    pub fn set_shutdown_handle(&mut self, handle: ShutdownHandle) {
        self.shutdown_handle = Some(handle);
    }
}

/// Shared server state wrapped in an Arc<RwLock>.
pub type SharedState = Arc<RwLock<ServerState>>;

/// Creates a new shared state.
pub fn new_shared_state() -> SharedState {
    Arc::new(RwLock::new(ServerState::new()))
}

/// Request handler that processes incoming requests and produces responses.
pub struct RequestHandler {
    state: SharedState,
    resolver: TimeResolver,
    store: Arc<dyn MeetingStore>,
    bus: NotificationBus,
    dispatcher: Arc<NotificationDispatcher>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(
        state: SharedState,
        resolver: TimeResolver,
        store: Arc<dyn MeetingStore>,
        bus: NotificationBus,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            state,
            resolver,
            store,
            bus,
            dispatcher,
        }
    }

    /// Returns the bus this handler publishes on.
    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Handles a single request and returns the response.
    #[tracing::instrument(skip(self, request))]
    pub async fn handle(&self, request: &Request) -> Response {
        match request {
            Request::Ping => {
                debug!("Handling Ping request");
                Response::Pong
            }
            Request::Status => {
                debug!("Handling Status request");
                let uptime = self.state.read().await.uptime_seconds();
                Response::status(
                    StatusInfo::new(uptime)
                        .with_observers(self.bus.observer_count())
                        .with_dispatch_failures(self.dispatcher.dispatch_failures()),
                )
            }
            Request::Resolve {
                participants,
                dst_policy,
            } => {
                debug!(
                    participant_count = participants.len(),
                    ?dst_policy,
                    "Handling Resolve request"
                );
                self.resolve(participants, *dst_policy)
            }
            Request::Schedule {
                owner_email,
                participants,
            } => {
                debug!(
                    owner = %owner_email,
                    participant_count = participants.len(),
                    "Handling Schedule request"
                );
                self.schedule(owner_email, participants).await
            }
            Request::GetMeetings { owner_email } => {
                debug!(owner = %owner_email, "Handling GetMeetings request");
                match self.store.find_by_owner(owner_email).await {
                    Ok(meetings) => {
                        debug!(meeting_count = meetings.len(), "Returning meetings");
                        Response::meetings(meetings)
                    }
                    Err(e) => {
                        warn!(error = %e, owner = %owner_email, "Store lookup failed");
                        Response::error(ErrorCode::StoreFailure, e.to_string())
                    }
                }
            }
            Request::Subscribe => {
                // Reached only when Subscribe arrives outside a live
                // connection; the connection loop intercepts it first.
                Response::error(
                    ErrorCode::InvalidRequest,
                    "subscribe switches a live connection into streaming mode",
                )
            }
            Request::Shutdown => {
                info!("Handling Shutdown request");
                let mut state = self.state.write().await;
                state.request_shutdown();
                Response::Ok
            }
        }
    }

    /// Resolves a proposal, honoring a per-request DST policy override.
    fn resolve(
        &self,
        participants: &[ParticipantSlot],
        dst_policy: Option<meetpoint_core::DstPolicy>,
    ) -> Response {
        let resolver = match dst_policy {
            Some(policy) => self.resolver.with_dst_policy(policy),
            None => self.resolver,
        };
        let proposal = MeetingProposal::new(participants.to_vec());
        match resolver.resolve(&proposal) {
            Ok(outcome) => {
                debug!(outcome = %outcome, "Proposal resolved");
                Response::resolution(&outcome)
            }
            Err(e) => Response::error(ErrorCode::from(&e), e.to_string()),
        }
    }

    /// Resolves, persists, and publishes a scheduling event.
    ///
    /// Computation errors reach the caller before any persistence attempt;
    /// a store failure surfaces to the caller and publishes nothing.
    async fn schedule(&self, owner_email: &str, participants: &[ParticipantSlot]) -> Response {
        let proposal = MeetingProposal::new(participants.to_vec());
        let outcome = match self.resolver.resolve(&proposal) {
            Ok(outcome) => outcome,
            Err(e) => return Response::error(ErrorCode::from(&e), e.to_string()),
        };

        let meeting = ResolvedMeeting::new(owner_email, participants.to_vec(), outcome);
        match self.store.save(meeting).await {
            Ok(record) => {
                let delivered = self
                    .bus
                    .publish(&NotificationEvent::meeting_scheduled(owner_email));
                info!(
                    meeting_id = %record.id,
                    owner = %owner_email,
                    outcome = %record.meeting.outcome,
                    observers = delivered,
                    "Meeting scheduled"
                );
                Response::scheduled(record)
            }
            Err(e) => {
                warn!(error = %e, owner = %owner_email, "Failed to persist meeting");
                Response::error(ErrorCode::StoreFailure, e.to_string())
            }
        }
    }

    /// Handles a connection, processing requests until it closes.
    pub async fn handle_connection(&self, mut conn: Connection) -> ServerResult<()> {
        loop {
            match conn.read_request().await {
                Ok(Some(envelope)) => {
                    if matches!(envelope.payload, Request::Subscribe) {
                        return self.serve_observer(conn, envelope.request_id).await;
                    }

                    let response = self.handle(&envelope.payload).await;
                    conn.respond(&envelope.request_id, response).await?;

                    if self.state.read().await.shutdown_requested() {
                        return Err(ServerError::Shutdown);
                    }
                }
                Ok(None) => {
                    debug!("Client disconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Error reading request");
                    return Err(e);
                }
            }
        }
    }

    /// Streams published events to a subscribed connection until disconnect.
    ///
    /// Every frame reuses the subscribe request's id. Each delivered event
    /// also triggers this observer's email dispatch, off the delivery path.
    async fn serve_observer(&self, conn: Connection, request_id: String) -> ServerResult<()> {
        let mut subscription = self.bus.subscribe();
        let observer_id = subscription.id();
        info!(observer_id, "Observer connected");

        let (stream, _permit) = conn.into_parts();
        let (mut read_half, mut write_half) = stream.into_split();

        // Acknowledge before any event can be delivered on this stream.
        let ack = Envelope::response(request_id.as_str(), Response::Ok);
        write_frame(&mut write_half, &ack).await?;

        let mut scratch = [0u8; 64];
        loop {
            tokio::select! {
                event = subscription.recv() => match event {
                    Some(event) => {
                        self.dispatcher.dispatch(event.clone());
                        let frame =
                            Envelope::response(request_id.as_str(), Response::event(event));
                        if let Err(e) = write_frame(&mut write_half, &frame).await {
                            debug!(observer_id, error = %e, "Observer write failed");
                            break;
                        }
                    }
                    None => break,
                },
                read = read_half.read(&mut scratch) => match read {
                    // EOF or error: the client went away.
                    Ok(0) | Err(_) => break,
                    // Bytes sent mid-stream carry no meaning here.
                    Ok(_) => {}
                },
            }
        }

        info!(observer_id, "Observer disconnected");
        Ok(())
    }
}

/// Writes one framed envelope to a stream half.
async fn write_frame<W>(writer: &mut W, envelope: &Envelope<Response>) -> ServerResult<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let bytes = encode_message(envelope)?;
    writer.write_all(&bytes).await?;
    Ok(())
}

/// Creates a connection handler function for use with `SocketServer::run`.
pub fn make_connection_handler(
    handler: Arc<RequestHandler>,
) -> impl Fn(Connection) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
+ Send
+ Sync
+ 'static {
    move |conn| {
        let handler = handler.clone();
        Box::pin(async move {
            if let Err(e) = handler.handle_connection(conn).await
                && !matches!(e, ServerError::Shutdown)
            {
                warn!(error = %e, "Connection handler error");
            }
        })
    }
}
