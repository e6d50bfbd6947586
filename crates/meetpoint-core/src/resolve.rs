//! Common-instant resolution across timezones.
//!
//! Each participant names the same real-world meeting moment on their own
//! local clock. [`TimeResolver`] normalizes every slot to a UTC instant and
//! reports [`MeetingOutcome::Common`] only when the instants are unanimous at
//! the configured granularity. Disagreement is always
//! [`MeetingOutcome::NoCommonTime`] — never an average or an extreme.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::meeting::{MeetingOutcome, MeetingProposal, ParticipantSlot};

/// Errors that can occur while resolving a proposal.
///
/// These are synchronous validation errors and reach the caller before any
/// persistence is attempted. `NoCommonTime` is not among them: it is a valid,
/// reportable outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The zone identifier is not in the IANA database.
    #[error("unrecognized timezone identifier: {zone:?}")]
    InvalidTimeZone { zone: String },

    /// The local time occurs twice in its zone (DST fold).
    #[error("{local} is ambiguous in {zone} (DST fold)")]
    AmbiguousLocalTime { zone: String, local: NaiveDateTime },

    /// The local time is skipped in its zone (DST gap).
    #[error("{local} does not exist in {zone} (DST gap)")]
    NonexistentLocalTime { zone: String, local: NaiveDateTime },

    /// A proposal needs at least one participant.
    #[error("proposal has no participants")]
    EmptyProposal,
}

/// How to interpret a local time that falls in a DST transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstPolicy {
    /// Use the offset in force before the transition.
    #[default]
    Earlier,
    /// Use the offset in force after the transition.
    Later,
    /// Surface the ambiguity to the caller instead of resolving it.
    Reject,
}

/// The resolution at which two instants count as equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Exact to the minute.
    #[default]
    Minute,
    /// Exact to the second.
    Second,
}

impl Granularity {
    /// Truncates an instant to this granularity.
    pub fn truncate(self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let truncated = match self {
            Self::Minute => instant.with_second(0).and_then(|i| i.with_nanosecond(0)),
            Self::Second => instant.with_nanosecond(0),
        };
        truncated.expect("valid truncation")
    }
}

/// Resolves whether a proposal's slots name one common meeting instant.
///
/// Pure and deterministic: identical inputs (and timezone database version)
/// always yield identical outputs. No side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeResolver {
    dst_policy: DstPolicy,
    granularity: Granularity,
}

impl TimeResolver {
    /// Creates a resolver with the default earlier-offset policy and
    /// minute granularity.
    pub fn new() -> Self {
        Self::default()
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

    /// Returns the configured DST policy.
    pub fn dst_policy(&self) -> DstPolicy {
        self.dst_policy
    }

    /// Resolves a proposal.
    ///
    /// All zone identifiers are validated before any instant is computed, so
    /// an unrecognized zone anywhere in the proposal fails the whole request.
    /// A single participant is trivially common; duplicate slots are
    /// evaluated independently, not deduplicated.
    pub fn resolve(&self, proposal: &MeetingProposal) -> Result<MeetingOutcome, ResolveError> {
        if proposal.is_empty() {
            return Err(ResolveError::EmptyProposal);
        }

        let mut zones = Vec::with_capacity(proposal.len());
        for slot in &proposal.participants {
            let tz: Tz = slot
                .time_zone
                .parse()
                .map_err(|_| ResolveError::InvalidTimeZone {
                    zone: slot.time_zone.clone(),
                })?;
            zones.push(tz);
        }

        let mut instants = Vec::with_capacity(proposal.len());
        for (slot, tz) in proposal.participants.iter().zip(zones) {
            let instant = self.instant_for(slot, tz)?;
            instants.push(self.granularity.truncate(instant));
        }

        let first = instants[0];
        if instants.iter().all(|instant| *instant == first) {
            Ok(MeetingOutcome::Common(first))
        } else {
            Ok(MeetingOutcome::NoCommonTime)
        }
    }

    /// Normalizes one slot to a UTC instant under the configured DST policy.
    fn instant_for(&self, slot: &ParticipantSlot, tz: Tz) -> Result<DateTime<Utc>, ResolveError> {
        let local = slot.local_datetime();
        match tz.from_local_datetime(&local) {
            LocalResult::Single(instant) => Ok(instant.with_timezone(&Utc)),
            LocalResult::Ambiguous(first, second) => match self.dst_policy {
                DstPolicy::Earlier => Ok(first.with_timezone(&Utc)),
                DstPolicy::Later => Ok(second.with_timezone(&Utc)),
                DstPolicy::Reject => Err(ResolveError::AmbiguousLocalTime {
                    zone: slot.time_zone.clone(),
                    local,
                }),
            },
            LocalResult::None => self.instant_in_gap(slot, tz, local),
        }
    }

    /// Interprets a wall-clock time that was skipped by a DST gap.
    ///
    /// The named time is read with the offset in force on the side of the
    /// gap the policy selects. The probe distance clears every real-world
    /// transition width.
    fn instant_in_gap(
        &self,
        slot: &ParticipantSlot,
        tz: Tz,
        local: NaiveDateTime,
    ) -> Result<DateTime<Utc>, ResolveError> {
        let nonexistent = || ResolveError::NonexistentLocalTime {
            zone: slot.time_zone.clone(),
            local,
        };

        let anchor = match self.dst_policy {
            DstPolicy::Reject => return Err(nonexistent()),
            DstPolicy::Earlier => tz
                .from_local_datetime(&(local - Duration::hours(3)))
                .earliest(),
            DstPolicy::Later => tz.from_local_datetime(&(local + Duration::hours(3))).latest(),
        };

        let anchor = anchor.ok_or_else(nonexistent)?;
        let offset_secs = i64::from(anchor.offset().fix().local_minus_utc());
        Ok(Utc.from_utc_datetime(&(local - Duration::seconds(offset_secs))))
    }
}
