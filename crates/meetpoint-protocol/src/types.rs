//! Request and response types for the meetpoint protocol.

use chrono::{DateTime, Utc};
use meetpoint_core::{DstPolicy, NotificationEvent, ParticipantSlot, ResolveError, ResolvedMeeting};
use serde::{Deserialize, Serialize};

use crate::PROTOCOL_VERSION;

/// Message envelope wrapping all protocol messages.
///
/// Every message exchanged between client and server is wrapped in this
/// envelope, which provides versioning and request correlation. Events
/// pushed to a subscribed connection reuse the subscribe request's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Protocol version (always "1" for v1).
    pub protocol_version: String,
    /// Unique request ID for correlation.
    pub request_id: String,
    /// The actual payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current protocol version.
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Creates a request envelope.
    pub fn request(request_id: impl Into<String>, request: T) -> Self {
        Self::new(request_id, request)
    }

    /// Creates a response envelope.
    pub fn response(request_id: impl Into<String>, response: T) -> Self {
        Self::new(request_id, response)
    }

    /// Checks if this envelope uses a compatible protocol version.
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Request types that can be sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Resolve whether the participants name one common meeting instant.
    Resolve {
        /// Participant slots, in submission order.
        participants: Vec<ParticipantSlot>,
        /// Optional override for the server's DST transition policy.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dst_policy: Option<DstPolicy>,
    },

    /// Resolve, persist the outcome for the owner, and publish a
    /// scheduling event to subscribed observers.
    Schedule {
        /// Identifies the organizing user. Not validated here; authorization
        /// is the persistence collaborator's boundary.
        owner_email: String,
        /// Participant slots, in submission order.
        participants: Vec<ParticipantSlot>,
    },

    /// Get all meetings saved for an owner.
    GetMeetings {
        /// The owner whose meetings to list.
        owner_email: String,
    },

    /// Switch this connection into streaming mode to receive published
    /// scheduling events until disconnect.
    Subscribe,

    /// Get server status.
    Status,

    /// Request server shutdown.
    Shutdown,

    /// Ping to check server liveness.
    Ping,
}

impl Request {
    /// Creates a Resolve request with the server's default DST policy.
    pub fn resolve(participants: Vec<ParticipantSlot>) -> Self {
        Self::Resolve {
            participants,
            dst_policy: None,
        }
    }

    /// Creates a Resolve request with an explicit DST policy.
    pub fn resolve_with_policy(participants: Vec<ParticipantSlot>, policy: DstPolicy) -> Self {
        Self::Resolve {
            participants,
            dst_policy: Some(policy),
        }
    }

    /// Creates a Schedule request.
    pub fn schedule(owner_email: impl Into<String>, participants: Vec<ParticipantSlot>) -> Self {
        Self::Schedule {
            owner_email: owner_email.into(),
            participants,
        }
    }

    /// Creates a GetMeetings request.
    pub fn get_meetings(owner_email: impl Into<String>) -> Self {
        Self::GetMeetings {
            owner_email: owner_email.into(),
        }
    }
}

/// Whether resolution found a common instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    /// All participants name the same instant.
    Common,
    /// The participants' instants disagree.
    None,
}

/// A persisted meeting as returned by the store.
///
/// The store assigns `id` and `created_at` at persistence time; the rest is
/// the [`ResolvedMeeting`] the coordination produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRecord {
    /// Store-assigned record identifier.
    pub id: String,
    /// When the record was persisted.
    pub created_at: DateTime<Utc>,
    /// The resolved meeting.
    #[serde(flatten)]
    pub meeting: ResolvedMeeting,
}

impl MeetingRecord {
    /// Creates a record.
    pub fn new(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        meeting: ResolvedMeeting,
    ) -> Self {
        Self {
            id: id.into(),
            created_at,
            meeting,
        }
    }
}

/// Response types that can be sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Outcome of a Resolve request.
    Resolution {
        /// Whether a common instant exists.
        status: ResolutionStatus,
        /// The formatted common instant, absent when status is `none`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        common_time: Option<String>,
    },

    /// A meeting was persisted.
    Scheduled {
        /// The stored record.
        meeting: MeetingRecord,
    },

    /// Meetings saved for the requested owner.
    Meetings {
        /// The records, in persistence order.
        meetings: Vec<MeetingRecord>,
    },

    /// A scheduling event pushed to a subscribed connection.
    Event {
        /// The published event.
        event: NotificationEvent,
    },

    /// Server status information.
    Status {
        /// Status details.
        #[serde(flatten)]
        info: StatusInfo,
    },

    /// Generic success response.
    Ok,

    /// Error response.
    Error {
        /// Error details.
        #[serde(flatten)]
        error: ErrorResponse,
    },

    /// Pong response to Ping.
    Pong,
}

impl Response {
    /// Creates a Resolution response from an outcome.
    pub fn resolution(outcome: &meetpoint_core::MeetingOutcome) -> Self {
        match outcome.as_instant() {
            Some(_) => Self::Resolution {
                status: ResolutionStatus::Common,
                common_time: Some(outcome.to_string()),
            },
            None => Self::Resolution {
                status: ResolutionStatus::None,
                common_time: None,
            },
        }
    }

    /// Creates a Scheduled response.
    pub fn scheduled(meeting: MeetingRecord) -> Self {
        Self::Scheduled { meeting }
    }

    /// Creates a Meetings response.
    pub fn meetings(meetings: Vec<MeetingRecord>) -> Self {
        Self::Meetings { meetings }
    }

    /// Creates an Event response.
    pub fn event(event: NotificationEvent) -> Self {
        Self::Event { event }
    }

    /// Creates a Status response.
    pub fn status(info: StatusInfo) -> Self {
        Self::Status { info }
    }

    /// Creates an Error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorResponse {
                code,
                message: message.into(),
            },
        }
    }

    /// Creates an error response from an ErrorResponse.
    pub fn from_error(error: ErrorResponse) -> Self {
        Self::Error { error }
    }

    /// Returns true if this is not an error response.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    /// Returns the error if this is an error response.
    pub fn as_error(&self) -> Option<&ErrorResponse> {
        match self {
            Self::Error { error } => Some(error),
            _ => None,
        }
    }
}

/// Server status information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    /// Server uptime in seconds.
    pub uptime_seconds: u64,

    /// Observers currently subscribed to the notification bus.
    pub connected_observers: usize,

    /// Downstream dispatch attempts that have failed since startup.
    pub dispatch_failures: u64,
}

impl StatusInfo {
    /// Creates a new StatusInfo.
    pub fn new(uptime_seconds: u64) -> Self {
        Self {
            uptime_seconds,
            connected_observers: 0,
            dispatch_failures: 0,
        }
    }

    /// Builder: set connected observer count.
    pub fn with_observers(mut self, count: usize) -> Self {
        self.connected_observers = count;
        self
    }

    /// Builder: set dispatch failure count.
    pub fn with_dispatch_failures(mut self, count: u64) -> Self {
        self.dispatch_failures = count;
        self
    }
}

/// Error codes for protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Invalid request format or content.
    InvalidRequest,

    /// Unrecognized timezone identifier.
    InvalidTimeZone,

    /// Local time falls in a DST fold and the policy rejects it.
    AmbiguousLocalTime,

    /// Local time falls in a DST gap and the policy rejects it.
    NonexistentLocalTime,

    /// The persistence collaborator failed.
    StoreFailure,

    /// Unknown or internal error.
    InternalError,

    /// Server is shutting down.
    ShuttingDown,
}

impl ErrorCode {
    /// Returns a human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "The request was invalid",
            Self::InvalidTimeZone => "Unrecognized timezone identifier",
            Self::AmbiguousLocalTime => "Local time is ambiguous (DST fold)",
            Self::NonexistentLocalTime => "Local time does not exist (DST gap)",
            Self::StoreFailure => "Meeting store returned an error",
            Self::InternalError => "An internal error occurred",
            Self::ShuttingDown => "Server is shutting down",
        }
    }
}

impl From<&ResolveError> for ErrorCode {
    fn from(error: &ResolveError) -> Self {
        match error {
            ResolveError::InvalidTimeZone { .. } => Self::InvalidTimeZone,
            ResolveError::AmbiguousLocalTime { .. } => Self::AmbiguousLocalTime,
            ResolveError::NonexistentLocalTime { .. } => Self::NonexistentLocalTime,
            ResolveError::EmptyProposal => Self::InvalidRequest,
        }
    }
}

/// Error response details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use meetpoint_core::{MeetingOutcome, MeetingProposal, TimeResolver};

    fn slot(name: &str, zone: &str, h: u32, m: u32) -> ParticipantSlot {
        ParticipantSlot::new(
            name,
            zone,
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            NaiveTime::from_hms_opt(h, m, 0).unwrap(),
        )
    }

    #[test]
    fn envelope_creation() {
        let envelope = Envelope::request("req-123", Request::Ping);
        assert_eq!(envelope.protocol_version, "1");
        assert_eq!(envelope.request_id, "req-123");
        assert!(envelope.is_compatible());
    }

    #[test]
    fn envelope_incompatible_version() {
        let envelope = Envelope {
            protocol_version: "2".to_string(),
            request_id: "req-123".to_string(),
            payload: Request::Ping,
        };
        assert!(!envelope.is_compatible());
    }

    #[test]
    fn request_serde_ping() {
        let request = Request::Ping;
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Request::Ping);
    }

    #[test]
    fn request_serde_resolve() {
        let request = Request::resolve(vec![slot("Alice", "America/New_York", 9, 0)]);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""type":"resolve""#));
        assert!(!json.contains("dst_policy"));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn request_serde_resolve_with_policy() {
        let request = Request::resolve_with_policy(
            vec![slot("Alice", "America/New_York", 9, 0)],
            DstPolicy::Reject,
        );
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""dst_policy":"reject""#));
    }

    #[test]
    fn request_serde_schedule() {
        let request = Request::schedule(
            "owner@example.com",
            vec![
                slot("Alice", "America/New_York", 9, 0),
                slot("Bob", "Europe/London", 14, 0),
            ],
        );
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""type":"schedule""#));
        assert!(json.contains(r#""owner_email":"owner@example.com""#));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn response_resolution_from_common_outcome() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 10, 13, 0, 0).unwrap();
        let response = Response::resolution(&MeetingOutcome::Common(instant));
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""status":"common""#));
        assert!(json.contains(r#""common_time":"2025-06-10 13:00 UTC""#));
    }

    #[test]
    fn response_resolution_from_no_common_time() {
        let response = Response::resolution(&MeetingOutcome::NoCommonTime);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""status":"none""#));
        assert!(!json.contains("common_time"));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn resolution_matches_resolver_output() {
        let proposal = MeetingProposal::new(vec![
            slot("Alice", "America/New_York", 9, 0),
            slot("Bob", "Europe/London", 14, 0),
        ]);
        let outcome = TimeResolver::new().resolve(&proposal).unwrap();
        match Response::resolution(&outcome) {
            Response::Resolution {
                status,
                common_time,
            } => {
                assert_eq!(status, ResolutionStatus::Common);
                assert_eq!(common_time.as_deref(), Some("2025-06-10 13:00 UTC"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn meeting_record_flattens_resolved_meeting() {
        let meeting = ResolvedMeeting::new(
            "owner@example.com",
            vec![slot("Alice", "America/New_York", 9, 0)],
            MeetingOutcome::NoCommonTime,
        );
        let record = MeetingRecord::new(
            "rec-1",
            Utc.with_ymd_and_hms(2025, 6, 10, 13, 0, 0).unwrap(),
            meeting,
        );
        let json = serde_json::to_string(&record).unwrap();
        // Flattened: owner_email sits next to id, not under a nested key.
        assert!(json.contains(r#""id":"rec-1""#));
        assert!(json.contains(r#""owner_email":"owner@example.com""#));
        assert!(!json.contains(r#""meeting""#));

        let parsed: MeetingRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn response_serde_event() {
        let response = Response::event(NotificationEvent::meeting_scheduled("owner@example.com"));
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""type":"event""#));
        assert!(json.contains(r#""kind":"meeting_scheduled""#));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn response_serde_status() {
        let info = StatusInfo::new(3600).with_observers(3).with_dispatch_failures(1);
        let response = Response::status(info);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("uptime_seconds"));
        assert!(json.contains(r#""connected_observers":3"#));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_success());
    }

    #[test]
    fn response_serde_error() {
        let response = Response::error(ErrorCode::InvalidTimeZone, "Mars/Phobos");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("invalid_time_zone"));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert!(!parsed.is_success());
        let error = parsed.as_error().unwrap();
        assert_eq!(error.code, ErrorCode::InvalidTimeZone);
    }

    #[test]
    fn error_code_from_resolve_error() {
        let error = ResolveError::InvalidTimeZone {
            zone: "Mars/Phobos".to_string(),
        };
        assert_eq!(ErrorCode::from(&error), ErrorCode::InvalidTimeZone);
        assert_eq!(
            ErrorCode::from(&ResolveError::EmptyProposal),
            ErrorCode::InvalidRequest
        );
    }

    #[test]
    fn error_response_display() {
        let error = ErrorResponse::new(ErrorCode::StoreFailure, "backend down");
        let display = format!("{}", error);
        assert!(display.contains("store"));
        assert!(display.contains("backend down"));
    }

    #[test]
    fn full_envelope_roundtrip() {
        let request = Envelope::request("req-abc", Request::Subscribe);
        let json = serde_json::to_string(&request).unwrap();
        let parsed: Envelope<Request> = serde_json::from_str(&json).unwrap();
        assert_eq!(request, parsed);

        let response = Envelope::response("req-abc", Response::Pong);
        let json = serde_json::to_string(&response).unwrap();
        let parsed: Envelope<Response> = serde_json::from_str(&json).unwrap();
        assert_eq!(response, parsed);
    }
}
