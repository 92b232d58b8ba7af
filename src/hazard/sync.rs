//! Telemetry intake and hazard synchronization
//!
//! The telemetry collaborator pushes events into a channel; the session drains
//! it once per tick and hands each event to the `Synchronizer`, which matches
//! the caster position to a sequence member and rewrites that sequence's
//! schedule.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::sequence::{Anchor, HazardId, HazardModel, SequenceId};
use crate::consts::MATCH_TOLERANCE_SQ;

/// One observation reported by the telemetry source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// A hazard is activating right now
    Hit { action: u32, position: Vec3 },
    /// A hazard will activate `lead_time` seconds from now
    CastStarted {
        action: u32,
        position: Vec3,
        lead_time: f32,
    },
}

impl TelemetryEvent {
    pub fn action(&self) -> u32 {
        match *self {
            TelemetryEvent::Hit { action, .. } | TelemetryEvent::CastStarted { action, .. } => action,
        }
    }

    pub fn position(&self) -> Vec3 {
        match *self {
            TelemetryEvent::Hit { position, .. } | TelemetryEvent::CastStarted { position, .. } => position,
        }
    }
}

/// Producer half handed to the telemetry collaborator
#[derive(Debug, Clone)]
pub struct TelemetryFeed {
    tx: Sender<TelemetryEvent>,
}

impl TelemetryFeed {
    /// Queue an event; returns false once the session side has gone away
    pub fn send(&self, event: TelemetryEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn hit(&self, action: u32, position: Vec3) -> bool {
        self.send(TelemetryEvent::Hit { action, position })
    }

    pub fn cast_started(&self, action: u32, position: Vec3, lead_time: f32) -> bool {
        self.send(TelemetryEvent::CastStarted {
            action,
            position,
            lead_time,
        })
    }
}

/// Consumer half owned by the session
#[derive(Debug)]
pub struct TelemetryInbox {
    rx: Receiver<TelemetryEvent>,
}

impl TelemetryInbox {
    /// Everything queued since the last drain, without blocking
    pub fn drain(&self) -> impl Iterator<Item = TelemetryEvent> + '_ {
        self.rx.try_iter()
    }
}

pub fn telemetry_channel() -> (TelemetryFeed, TelemetryInbox) {
    let (tx, rx) = mpsc::channel();
    (TelemetryFeed { tx }, TelemetryInbox { rx })
}

/// Venue-specific mapping from action identifiers to candidate sequences
#[derive(Debug, Clone, Default)]
pub struct TriggerTable {
    hits: HashMap<u32, Vec<SequenceId>>,
    casts: HashMap<u32, Vec<SequenceId>>,
}

impl TriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidates are tried in insertion order
    pub fn on_hit(&mut self, action: u32, candidates: impl IntoIterator<Item = SequenceId>) -> &mut Self {
        self.hits.entry(action).or_default().extend(candidates);
        self
    }

    pub fn on_cast(&mut self, action: u32, candidates: impl IntoIterator<Item = SequenceId>) -> &mut Self {
        self.casts.entry(action).or_default().extend(candidates);
        self
    }

    pub fn candidates(&self, event: &TelemetryEvent) -> &[SequenceId] {
        let table = match event {
            TelemetryEvent::Hit { .. } => &self.hits,
            TelemetryEvent::CastStarted { .. } => &self.casts,
        };
        table.get(&event.action()).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Result of feeding one event to the synchronizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A sequence was (re)synchronized from the given member
    Synchronized(HazardId),
    /// Nothing matched; the event was dropped
    Unmatched,
}

impl SyncOutcome {
    pub fn is_synchronized(&self) -> bool {
        matches!(self, SyncOutcome::Synchronized(_))
    }
}

#[derive(Debug, Clone)]
pub struct Synchronizer {
    triggers: TriggerTable,
    match_tolerance_sq: f32,
}

impl Synchronizer {
    pub fn new(triggers: TriggerTable) -> Self {
        Self {
            triggers,
            match_tolerance_sq: MATCH_TOLERANCE_SQ,
        }
    }

    pub fn with_tolerance(mut self, tolerance_sq: f32) -> Self {
        self.match_tolerance_sq = tolerance_sq;
        self
    }

    pub fn triggers(&self) -> &TriggerTable {
        &self.triggers
    }

    /// Match an event to a sequence member and rewrite that sequence's schedule
    ///
    /// The first candidate sequence with a member near the caster wins.
    pub fn apply(&self, model: &mut HazardModel, event: &TelemetryEvent, now: f32) -> SyncOutcome {
        let (anchor, kind) = match *event {
            TelemetryEvent::Hit { .. } => (now, Anchor::Firing),
            TelemetryEvent::CastStarted { lead_time, .. } => (now + lead_time.max(0.0), Anchor::Upcoming),
        };
        let position = event.position();

        for &candidate in self.triggers.candidates(event) {
            let Some(sequence) = model.sequence_mut(candidate) else {
                continue;
            };
            let Some(member) = sequence.find_member(position, self.match_tolerance_sq) else {
                continue;
            };
            if !sequence.is_synchronized() {
                log::info!(
                    "Starting sequence '{}' from member {} at {:.3}",
                    sequence.name,
                    member,
                    anchor
                );
            }
            sequence.synchronize(member, anchor, kind);
            return SyncOutcome::Synchronized(HazardId {
                sequence: candidate,
                member,
            });
        }

        log::debug!(
            "Dropping unmatched action {} at {:?}",
            event.action(),
            position
        );
        SyncOutcome::Unmatched
    }
}
