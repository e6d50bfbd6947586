//! Notification events published on the bus.
//!
//! Events are transient: created at publish time, delivered to every
//! observer connected at that moment, then discarded. No durability, no
//! replay, no deduplication of repeated publishes.

use serde::{Deserialize, Serialize};

/// What a notification event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A meeting was resolved and persisted.
    MeetingScheduled,
    /// A downstream dispatch attempt failed.
    DeliveryFailed,
}

/// A scheduling event as delivered to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Event kind.
    pub kind: EventKind,
    /// Target identity for downstream dispatch.
    pub recipient: String,
    /// Human-readable description.
    pub payload: String,
}

impl NotificationEvent {
    /// Creates an event.
    pub fn new(kind: EventKind, recipient: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind,
            recipient: recipient.into(),
            payload: payload.into(),
        }
    }

    /// Creates a meeting-scheduled event with the standard message.
    pub fn meeting_scheduled(recipient: impl Into<String>) -> Self {
        Self::new(
            EventKind::MeetingScheduled,
            recipient,
            "You have a new meeting scheduled.",
        )
    }

    /// Creates a delivery-failure event describing a failed dispatch.
    pub fn delivery_failed(recipient: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EventKind::DeliveryFailed, recipient, reason)
    }
}
