//! Core types: participants, time resolution, notification events

pub mod event;
pub mod meeting;
pub mod resolve;
pub mod tracing;

pub use event::{EventKind, NotificationEvent};
pub use meeting::{MeetingOutcome, MeetingProposal, ParticipantSlot, ResolvedMeeting};
pub use resolve::{DstPolicy, Granularity, ResolveError, TimeResolver};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
