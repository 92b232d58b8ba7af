//! Live session for one venue
//!
//! Each tick drains queued telemetry into the hazard model, then either
//! rebuilds the route (after any successful synchronization) or drops the
//! waypoints the agent has already passed. Mutation and rebuild never
//! interleave.

use std::fmt;
use std::time::Instant;

use glam::Vec3;
use serde::Serialize;

use super::Venue;
use crate::consts::WAYPOINT_REACHED;
use crate::geom::length_xz;
use crate::hazard::{AoeShape, HazardId, HazardModel, TelemetryFeed, TelemetryInbox, telemetry_channel};
use crate::path::Waypoint;
use crate::plan::Plan;
use crate::settings::Settings;

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    pub synchronized: usize,
    pub unmatched: usize,
    pub rebuilt: bool,
}

/// Display snapshot of one hazard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HazardState {
    pub id: HazardId,
    pub sequence: String,
    pub shape: AoeShape,
    pub origin: Vec3,
    pub next_activation: Option<f32>,
    /// Seconds until the next activation, from the query time
    pub time_until: Option<f32>,
    pub outline: Vec<Vec3>,
}

/// Chosen route and which members each sequence was first seen at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strategy {
    pub route: String,
    pub first_observed: Vec<(String, usize)>,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.route)?;
        for (i, (name, member)) in self.first_observed.iter().enumerate() {
            let sep = if i == 0 { " [" } else { ", " };
            write!(f, "{sep}{name}@{member}")?;
        }
        if !self.first_observed.is_empty() {
            write!(f, "]")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct VenueSession {
    venue: Venue,
    settings: Settings,
    feed: TelemetryFeed,
    inbox: TelemetryInbox,
    plan: Plan,
    dirty: bool,
    last_rebuild: Option<f32>,
}

impl VenueSession {
    pub fn new(venue: Venue, settings: Settings) -> Self {
        let (feed, inbox) = telemetry_channel();
        log::info!("Entering venue '{}' ({} planner)", venue.name, venue.planner.name());
        Self {
            venue,
            settings,
            feed,
            inbox,
            plan: Plan::default(),
            dirty: true,
            last_rebuild: None,
        }
    }

    /// Producer handle for the telemetry collaborator
    pub fn feed(&self) -> TelemetryFeed {
        self.feed.clone()
    }

    pub fn venue(&self) -> &Venue {
        &self.venue
    }

    pub fn model(&self) -> &HazardModel {
        &self.venue.model
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Remaining waypoints; empty when no safe route is currently known
    pub fn route(&self) -> &[Waypoint] {
        &self.plan.waypoints
    }

    /// Force a rebuild on the next tick
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Forget all timing knowledge, e.g. when the venue is re-entered
    pub fn reset(&mut self) {
        for _ in self.inbox.drain() {}
        self.venue.model.reset();
        self.plan = Plan::default();
        self.dirty = true;
        self.last_rebuild = None;
    }

    pub fn tick(&mut self, agent_pos: Vec3, now: f32) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        for event in self.inbox.drain() {
            if self.venue.synchronizer.apply(&mut self.venue.model, &event, now).is_synchronized() {
                outcome.synchronized += 1;
            } else {
                outcome.unmatched += 1;
            }
        }
        if outcome.synchronized > 0 {
            self.dirty = true;
        }
        if let (Some(interval), Some(last)) = (self.settings.rebuild_interval, self.last_rebuild) {
            if now - last >= interval {
                self.dirty = true;
            }
        }

        if self.dirty {
            self.rebuild(agent_pos, now);
            outcome.rebuilt = true;
        } else {
            self.drop_passed(agent_pos);
        }
        outcome
    }

    fn rebuild(&mut self, agent_pos: Vec3, now: f32) {
        let started = Instant::now();
        self.plan = self.venue.planner.plan(&self.venue.model, agent_pos, now);
        self.dirty = false;
        self.last_rebuild = Some(now);
        log::info!(
            "Rebuilt route '{}' in {:.3}ms: {} waypoints, arrival {:?}",
            self.plan.label,
            started.elapsed().as_secs_f64() * 1000.0,
            self.plan.waypoints.len(),
            self.plan.arrival
        );
    }

    /// Drop leading waypoints that are reached or already behind the agent
    fn drop_passed(&mut self, agent_pos: Vec3) {
        let profile = &self.venue.profile;
        let here = profile.progress(agent_pos);
        let passed = self
            .plan
            .waypoints
            .iter()
            .take_while(|w| {
                length_xz(w.dest - agent_pos) <= WAYPOINT_REACHED || profile.progress(w.dest) < here - WAYPOINT_REACHED
            })
            .count();
        if passed > 0 {
            log::trace!("Dropping {passed} passed waypoints");
            self.plan.waypoints.drain(..passed);
        }
    }

    /// Shape, pose and timing of every hazard, relative to `now`
    pub fn hazards(&self, now: f32) -> Vec<HazardState> {
        self.venue
            .model
            .sequences()
            .flat_map(|(sequence, s)| {
                s.members().iter().enumerate().map(move |(member, aoe)| HazardState {
                    id: HazardId { sequence, member },
                    sequence: s.name.clone(),
                    shape: aoe.shape,
                    origin: aoe.origin,
                    next_activation: aoe.next_activation,
                    time_until: aoe.time_until_activation(now),
                    outline: aoe.outline(self.settings.tessellation_error),
                })
            })
            .collect()
    }

    /// Hazards that would be live on the stretch covered moving from `pos`
    /// along `dir`, with seconds until each overlap, soonest first
    pub fn risky_hazards(&self, pos: Vec3, dir: Vec3, now: f32) -> Vec<(HazardId, f32)> {
        let mut risky: Vec<(HazardId, f32)> = self
            .venue
            .model
            .hazards()
            .filter_map(|(id, aoe)| Some((id, aoe.time_until_overlap(pos, dir, now, self.settings.speed)?)))
            .collect();
        risky.sort_by(|a, b| a.1.total_cmp(&b.1));
        risky
    }

    pub fn strategy(&self) -> Strategy {
        Strategy {
            route: self.plan.label.clone(),
            first_observed: self
                .venue
                .model
                .sequences()
                .filter_map(|(_, s)| Some((s.name.clone(), s.first_observed()?)))
                .collect(),
        }
    }
}
