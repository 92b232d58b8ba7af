//! Hazard Route demo runner
//!
//! Usage: `hazard-route [VENUE] [SETTINGS]` where VENUE is a preset name or a
//! venue JSON file. Drives a session with simulated telemetry (a hidden
//! schedule replayed from a seeded RNG) and an agent that follows the route.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use hazard_route::geom::length_xz;
use hazard_route::hazard::{SequenceId, TelemetryFeed};
use hazard_route::path::Waypoint;
use hazard_route::venue::{VenueConfig, VenueSession, find_venue, presets, select_venue};
use hazard_route::{ConfigError, ConfigResult, Settings, direction_xz, xz};

const TICK_DT: f32 = 0.1;
const MAX_TIME: f32 = 90.0;
const SEED: u64 = 0x5eed_cafe;

/// How far ahead of an activation a cast may be announced (seconds)
const CAST_LEAD: f32 = 1.0;

/// Caster positions are reported with up to this much error per axis
const POSITION_JITTER: f32 = 0.2;

struct Firing {
    sequence: usize,
    member: usize,
    at: f32,
    announced: bool,
}

/// Replays a hidden schedule as telemetry events
struct SimulatedTelemetry {
    rng: Pcg32,
    feed: TelemetryFeed,
    firings: Vec<Firing>,
    repeats: Vec<f32>,
    origins: Vec<Vec<Vec3>>,
    hit_actions: Vec<Option<u32>>,
    cast_actions: Vec<Option<u32>>,
}

impl SimulatedTelemetry {
    fn new(config: &VenueConfig, session: &VenueSession, seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let action_for = |table: &BTreeMap<u32, Vec<String>>, name: &str| {
            table
                .iter()
                .find(|(_, names)| names.iter().any(|n| n == name))
                .map(|(&action, _)| action)
        };

        let mut firings = Vec::new();
        let mut repeats = Vec::new();
        let mut origins = Vec::new();
        let mut hit_actions = Vec::new();
        let mut cast_actions = Vec::new();
        for (id, sequence) in session.model().sequences() {
            let repeat = sequence.repeat();
            let phase = rng.random_range(0.0..repeat);
            let mut offset = 0.0;
            for (member, aoe) in sequence.members().iter().enumerate() {
                firings.push(Firing {
                    sequence: id.0,
                    member,
                    at: phase + offset,
                    announced: false,
                });
                offset += aoe.seq_delay;
            }
            repeats.push(repeat);
            origins.push(sequence.members().iter().map(|m| m.origin).collect());
            hit_actions.push(action_for(&config.triggers.hits, &sequence.name));
            cast_actions.push(action_for(&config.triggers.casts, &sequence.name));
        }

        Self {
            rng,
            feed: session.feed(),
            firings,
            repeats,
            origins,
            hit_actions,
            cast_actions,
        }
    }

    fn jittered(&mut self, p: Vec3) -> Vec3 {
        let j = POSITION_JITTER;
        p + Vec3::new(
            self.rng.random_range(-j..j),
            self.rng.random_range(-j..j),
            self.rng.random_range(-j..j),
        )
    }

    /// Report everything due by `now`; returns the activations that happened
    fn emit(&mut self, now: f32) -> Vec<(usize, usize)> {
        let mut fired = Vec::new();
        for i in 0..self.firings.len() {
            let (sequence, member, at) = (self.firings[i].sequence, self.firings[i].member, self.firings[i].at);
            let origin = self.origins[sequence][member];

            if !self.firings[i].announced && now >= at - CAST_LEAD {
                self.firings[i].announced = true;
                if let Some(action) = self.cast_actions[sequence] {
                    if self.rng.random_bool(0.5) {
                        let position = self.jittered(origin);
                        self.feed.cast_started(action, position, (at - now).max(0.0));
                    }
                }
            }

            if now >= at {
                if let Some(action) = self.hit_actions[sequence] {
                    let position = self.jittered(origin);
                    self.feed.hit(action, position);
                }
                fired.push((sequence, member));
                self.firings[i].at += self.repeats[sequence];
                self.firings[i].announced = false;
            }
        }
        fired
    }
}

/// Agent that walks the current route at fixed speed
struct Agent {
    pos: Vec3,
    speed: f32,
}

impl Agent {
    fn step(&mut self, route: &[Waypoint], now: f32, dt: f32) {
        let Some(next) = route.first() else {
            return;
        };
        if next.start_at.is_some_and(|t| now < t) {
            return;
        }
        let to_go = next.dest - self.pos;
        let dist = length_xz(to_go);
        let stride = self.speed * dt;
        if dist <= stride {
            self.pos = next.dest;
        } else {
            self.pos += to_go * (stride / dist);
        }
    }
}

fn load_venue(arg: Option<&str>) -> ConfigResult<VenueConfig> {
    let configs = presets::all();
    match arg {
        Some(arg) if Path::new(arg).extension().is_some_and(|e| e == "json") => VenueConfig::load(arg),
        Some(name) => find_venue(&configs, name).cloned(),
        None => select_venue(&configs, Vec3::ZERO)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownVenue("<entry position>".to_string())),
    }
}

fn run() -> ConfigResult<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = load_venue(args.get(1).map(String::as_str))?;
    let settings = match args.get(2) {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let venue = config.build(&settings)?;
    let mut session = VenueSession::new(venue, settings.clone());
    let mut telemetry = SimulatedTelemetry::new(&config, &session, SEED);
    let mut agent = Agent {
        pos: config.start_position(),
        speed: settings.speed,
    };

    let mut now = 0.0;
    let mut struck = 0;
    let mut last_report = -1.0;
    while now < MAX_TIME {
        for (sequence, member) in telemetry.emit(now) {
            let Some(seq) = session.model().sequence(SequenceId(sequence)) else {
                continue;
            };
            if seq.member(member).is_some_and(|aoe| aoe.contains(agent.pos)) {
                struck += 1;
                log::warn!("{:.1}s: struck by {}#{} at {:?}", now, seq.name, member, xz(agent.pos));
            }
        }

        let outcome = session.tick(agent.pos, now);
        if outcome.rebuilt {
            log::info!("{:.1}s: strategy {}", now, session.strategy());
        }
        if now - last_report >= 1.0 {
            last_report = now;
            log::debug!("{:.1}s: agent at {:?}, {} waypoints left", now, xz(agent.pos), session.route().len());
            if let Some(next) = session.route().first() {
                if let Some(dir) = direction_xz(agent.pos, next.dest) {
                    for (id, t) in session.risky_hazards(agent.pos, dir, now) {
                        log::debug!("  {:?} overlaps the next leg in {:.2}s", id, t);
                    }
                }
            }
        }

        if session.plan().is_reachable() && session.route().is_empty() {
            log::info!("{:.1}s: finished '{}' with {} strikes", now, config.name, struck);
            return Ok(());
        }
        agent.step(session.route(), now, TICK_DT);
        now += TICK_DT;
    }

    log::warn!("Gave up after {MAX_TIME}s at {:?} with {struck} strikes", xz(agent.pos));
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Hazard Route starting...");
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
