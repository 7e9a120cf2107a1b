//! Milestone Tracker.
//!
//! Per kind it keeps a reference value (what the last notification, or the
//! baseline, was measured against) and the last value actually notified.
//! A crossing is only reported, never recorded: the caller commits after the
//! notification went out, so a failed dispatch is retried next cycle.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ocr::{NumericKind, NumericReading};

/// Where the milestone boundaries are.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MilestonePolicy {
    /// A boundary at every multiple of `step`.
    Every { step: u64 },
    /// Boundaries at the listed values.
    Thresholds { values: Vec<u64> },
}

impl MilestonePolicy {
    /// Index of the band `value` falls in. Crossing a boundary changes it.
    fn bucket(&self, value: u64) -> u64 {
        match self {
            MilestonePolicy::Every { step } => value / (*step).max(1),
            MilestonePolicy::Thresholds { values } => {
                values.iter().filter(|t| **t <= value).count() as u64
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Unresolved,
    /// First resolved reading; nothing to compare against yet.
    Baseline,
    Unchanged,
    /// Changed, but within the same band.
    NoBoundary,
    /// Dropped below the reference band; reference moved down.
    Rebaselined,
    AlreadyNotified,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationDecision {
    Notify { value: u64, previous: u64 },
    Skip(SkipReason),
}

#[derive(Clone, Debug)]
struct Record {
    policy: MilestonePolicy,
    reference: Option<u64>,
    last_notified: Option<u64>,
}

impl Record {
    fn new(policy: MilestonePolicy) -> Self {
        Self {
            policy,
            reference: None,
            last_notified: None,
        }
    }

    fn observe(&mut self, value: u64) -> NotificationDecision {
        let Some(reference) = self.reference else {
            self.reference = Some(value);
            return NotificationDecision::Skip(SkipReason::Baseline);
        };
        if value == reference {
            return NotificationDecision::Skip(SkipReason::Unchanged);
        }

        let (now, before) = (self.policy.bucket(value), self.policy.bucket(reference));
        if now < before {
            self.reference = Some(value);
            return NotificationDecision::Skip(SkipReason::Rebaselined);
        }
        if now == before {
            self.reference = Some(value);
            return NotificationDecision::Skip(SkipReason::NoBoundary);
        }
        if self.last_notified == Some(value) {
            return NotificationDecision::Skip(SkipReason::AlreadyNotified);
        }
        NotificationDecision::Notify {
            value,
            previous: reference,
        }
    }
}

/// Milestone state for level and zen. Lives as long as the loop.
#[derive(Clone, Debug)]
pub struct MilestoneTracker {
    level: Record,
    zen: Record,
}

impl MilestoneTracker {
    pub fn new(level: MilestonePolicy, zen: MilestonePolicy) -> Self {
        Self {
            level: Record::new(level),
            zen: Record::new(zen),
        }
    }

    fn record(&mut self, kind: NumericKind) -> &mut Record {
        match kind {
            NumericKind::Level => &mut self.level,
            NumericKind::Zen => &mut self.zen,
        }
    }

    /// Decides whether `reading` warrants a notification.
    ///
    /// Unresolved readings never touch state.
    pub fn observe(&mut self, reading: &NumericReading) -> NotificationDecision {
        let Some(value) = reading.value else {
            return NotificationDecision::Skip(SkipReason::Unresolved);
        };
        let decision = self.record(reading.kind).observe(value);
        debug!("Milestone {} {}: {:?}", reading.kind, value, decision);
        decision
    }

    /// Records that the notification for `value` was delivered.
    pub fn commit(&mut self, kind: NumericKind, value: u64) {
        let record = self.record(kind);
        record.reference = Some(value);
        record.last_notified = Some(value);
    }

    /// Sets a known starting value without notifying.
    pub fn seed(&mut self, kind: NumericKind, value: u64) {
        self.record(kind).reference = Some(value);
    }

    pub fn reference(&self, kind: NumericKind) -> Option<u64> {
        match kind {
            NumericKind::Level => self.level.reference,
            NumericKind::Zen => self.zen.reference,
        }
    }
}
