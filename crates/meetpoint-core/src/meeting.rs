//! Meeting data model.
//!
//! This module provides the types exchanged through a coordination round:
//! - [`ParticipantSlot`]: one participant's proposed availability
//! - [`MeetingProposal`]: the ephemeral set of slots submitted for resolution
//! - [`MeetingOutcome`]: the two-state result of resolution
//! - [`ResolvedMeeting`]: the artifact handed to the store

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// One participant's proposed availability, expressed on their local clock.
///
/// The timezone is carried as an IANA identifier string and validated when
/// the proposal is resolved, so an unrecognized zone is reported against the
/// slot that named it rather than failing at deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSlot {
    /// Display identifier, non-empty.
    pub name: String,
    /// IANA timezone identifier (e.g. "America/New_York").
    pub time_zone: String,
    /// Calendar date on the participant's local clock.
    pub selected_date: NaiveDate,
    /// Local time of day, carried as "HH:MM" on the wire.
    #[serde(with = "hhmm")]
    pub selected_time: NaiveTime,
}

impl ParticipantSlot {
    /// Creates a new participant slot.
    pub fn new(
        name: impl Into<String>,
        time_zone: impl Into<String>,
        selected_date: NaiveDate,
        selected_time: NaiveTime,
    ) -> Self {
        Self {
            name: name.into(),
            time_zone: time_zone.into(),
            selected_date,
            selected_time,
        }
    }

    /// Returns the naive local datetime named by this slot.
    pub fn local_datetime(&self) -> NaiveDateTime {
        self.selected_date.and_time(self.selected_time)
    }
}

/// Serde adapter for the "HH:MM" wire format of [`ParticipantSlot::selected_time`].
///
/// Accepts "HH:MM:SS" as well so callers that round-trip full times keep
/// working; always serializes as "HH:MM".
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|_| de::Error::custom(format!("invalid time of day: {raw:?}")))
    }
}

/// The set of participant slots submitted for one resolution request.
///
/// Ephemeral: constructed per request, never persisted itself. Only the
/// outcome it produces is persisted, as part of a [`ResolvedMeeting`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingProposal {
    /// Ordered participant slots, length >= 1 for a resolvable proposal.
    pub participants: Vec<ParticipantSlot>,
}

impl MeetingProposal {
    /// Creates a proposal from the given slots.
    pub fn new(participants: Vec<ParticipantSlot>) -> Self {
        Self { participants }
    }

    /// Returns the number of participant slots.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns true if the proposal has no participants.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

/// The result of resolving a proposal: one common instant, or none.
///
/// There is no third state. A non-unanimous set of instants is always
/// `NoCommonTime`, never an average or an arbitrarily chosen extreme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MeetingOutcome {
    /// Every participant's local entry names this UTC instant.
    Common(DateTime<Utc>),
    /// The participants' entries name at least two distinct instants.
    NoCommonTime,
}

impl MeetingOutcome {
    /// Returns true if a common instant was found.
    pub fn is_common(&self) -> bool {
        matches!(self, Self::Common(_))
    }

    /// Returns the common instant, if any.
    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Common(instant) => Some(*instant),
            Self::NoCommonTime => None,
        }
    }
}

impl std::fmt::Display for MeetingOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Common(instant) => write!(f, "{}", instant.format("%Y-%m-%d %H:%M UTC")),
            Self::NoCommonTime => write!(f, "No common time available"),
        }
    }
}

/// The artifact produced by a successful coordination round.
///
/// The store owns the record once persisted; this type only carries the value
/// to be stored. Owner identity is taken as given here — authorization is the
/// persistence collaborator's boundary, not this subsystem's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMeeting {
    /// Identifies the organizing user.
    pub owner_email: String,
    /// Copy of the slots that produced the outcome, in submission order.
    pub participants: Vec<ParticipantSlot>,
    /// The verified outcome; never a best guess.
    pub outcome: MeetingOutcome,
}

impl ResolvedMeeting {
    /// Creates a resolved meeting for the given owner.
    pub fn new(
        owner_email: impl Into<String>,
        participants: Vec<ParticipantSlot>,
        outcome: MeetingOutcome,
    ) -> Self {
        Self {
            owner_email: owner_email.into(),
            participants,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn slot(name: &str, zone: &str, h: u32, m: u32) -> ParticipantSlot {
        ParticipantSlot::new(
            name,
            zone,
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            NaiveTime::from_hms_opt(h, m, 0).unwrap(),
        )
    }

    #[test]
    fn slot_serde_uses_hhmm_wire_format() {
        let alice = slot("Alice", "America/New_York", 9, 0);
        let json = serde_json::to_string(&alice).unwrap();
        assert!(json.contains(r#""selected_time":"09:00""#));
        assert!(json.contains(r#""selected_date":"2025-06-10""#));

        let parsed: ParticipantSlot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, alice);
    }

    #[test]
    fn slot_serde_accepts_seconds() {
        let json = r#"{"name":"Bob","time_zone":"Europe/London","selected_date":"2025-06-10","selected_time":"14:30:00"}"#;
        let parsed: ParticipantSlot = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.selected_time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
    }

    #[test]
    fn slot_serde_rejects_garbage_time() {
        let json = r#"{"name":"Bob","time_zone":"Europe/London","selected_date":"2025-06-10","selected_time":"half past"}"#;
        assert!(serde_json::from_str::<ParticipantSlot>(json).is_err());
    }

    #[test]
    fn local_datetime_combines_date_and_time() {
        let s = slot("Alice", "America/New_York", 9, 30);
        assert_eq!(
            s.local_datetime(),
            NaiveDate::from_ymd_opt(2025, 6, 10)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn outcome_display() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 10, 13, 0, 0).unwrap();
        assert_eq!(
            MeetingOutcome::Common(instant).to_string(),
            "2025-06-10 13:00 UTC"
        );
        assert_eq!(
            MeetingOutcome::NoCommonTime.to_string(),
            "No common time available"
        );
    }

    #[test]
    fn outcome_serde_tags() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 10, 13, 0, 0).unwrap();
        let json = serde_json::to_string(&MeetingOutcome::Common(instant)).unwrap();
        assert!(json.contains(r#""type":"common""#));

        let json = serde_json::to_string(&MeetingOutcome::NoCommonTime).unwrap();
        assert_eq!(json, r#"{"type":"no_common_time"}"#);

        let parsed: MeetingOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, MeetingOutcome::NoCommonTime);
    }

    #[test]
    fn outcome_accessors() {
        let instant = Utc.with_ymd_and_hms(2025, 6, 10, 13, 0, 0).unwrap();
        let common = MeetingOutcome::Common(instant);
        assert!(common.is_common());
        assert_eq!(common.as_instant(), Some(instant));

        assert!(!MeetingOutcome::NoCommonTime.is_common());
        assert_eq!(MeetingOutcome::NoCommonTime.as_instant(), None);
    }

    #[test]
    fn resolved_meeting_roundtrip() {
        let meeting = ResolvedMeeting::new(
            "owner@example.com",
            vec![slot("Alice", "America/New_York", 9, 0)],
            MeetingOutcome::NoCommonTime,
        );
        let json = serde_json::to_string(&meeting).unwrap();
        let parsed: ResolvedMeeting = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meeting);
    }
}
