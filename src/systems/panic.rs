//! Panic - broadcast handling, exit routing and turning away from crowded exits.

use crate::boundary::AreaBoundary;
use crate::components::*;
use crate::config::SimConfig;
use crate::rng::{for_each_in_lanes, RngPool};
use crate::systems::congestion::{collect_exits, ExitInfo};
use crate::systems::tick::{TickCounters, TickStats};
use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A one-shot panic trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanicBroadcast {
    pub origin: Vec3,
    pub radius: f32,
}

/// Global panic flag plus broadcasts waiting for this tick's panic step.
#[derive(Resource, Debug, Clone, Default)]
pub struct PanicState {
    /// Set by a broadcast that reached at least one agent, cleared once nobody runs.
    pub active: bool,
    pending: Vec<PanicBroadcast>,
}

impl PanicState {
    pub fn broadcast(&mut self, origin: Vec3, radius: f32) {
        self.pending.push(PanicBroadcast { origin, radius });
    }

    pub fn pending(&self) -> &[PanicBroadcast] {
        &self.pending
    }
}

/// Where an agent flees to when there is no usable exit.
pub fn fallback_point(from: Vec3, boundary: &AreaBoundary, config: &SimConfig) -> Vec3 {
    match config.fallback_exit {
        Some(point) => point,
        None => boundary.outward_point(from, config.exit_walk_offset),
    }
}

fn nearest<'a>(from: Vec3, exits: impl Iterator<Item = &'a ExitInfo>) -> Option<&'a ExitInfo> {
    let mut best: Option<(&ExitInfo, f32)> = None;
    for exit in exits {
        let d = from.horizontal_distance(&exit.position);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((exit, d));
        }
    }
    best.map(|(exit, _)| exit)
}

/// Pick the exit a panicking agent heads for.
///
/// Nearest exit that is not overloaded, else the nearest exit, else the fallback point.
pub fn choose_exit(
    from: Vec3,
    exits: &[ExitInfo],
    boundary: &AreaBoundary,
    config: &SimConfig,
) -> (Vec3, Option<ExitId>) {
    nearest(from, exits.iter().filter(|e| !e.overloaded))
        .or_else(|| nearest(from, exits.iter()))
        .map(|e| (e.position, Some(e.id)))
        .unwrap_or_else(|| (fallback_point(from, boundary, config), None))
}

/// Pick a different exit for an agent whose current one is overloaded or gone.
///
/// Returns `None` when the agent should keep its current exit.
fn reroute(
    from: Vec3,
    current: ExitId,
    exits: &[ExitInfo],
    boundary: &AreaBoundary,
    config: &SimConfig,
) -> Option<(Vec3, Option<ExitId>)> {
    let still_exists = exits.iter().any(|e| e.id == current);
    match nearest(from, exits.iter().filter(|e| e.id != current && !e.overloaded)) {
        Some(exit) => Some((exit.position, Some(exit.id))),
        None if still_exists => None,
        None => Some(choose_exit(from, exits, boundary, config)),
    }
}

struct RerouteItem {
    entity: Entity,
    id: AgentId,
    position: Vec3,
    state: AgentState,
    rerouted: bool,
}

/// System that lets running agents turn away from overloaded or removed exits.
///
/// An agent reconsiders at most once per flight (`marked`); a removed exit always forces a
/// new choice.
pub fn exit_reroute_system(
    config: Res<SimConfig>,
    boundary: Res<AreaBoundary>,
    mut pool: ResMut<RngPool>,
    mut stats: ResMut<TickStats>,
    exits: Query<(&ExitId, &Position, &ExitStatus)>,
    mut agents: Query<(Entity, &AgentId, &Position, &mut AgentState)>,
) {
    let exits = collect_exits(exits.iter());

    let mut items: Vec<RerouteItem> = agents
        .iter()
        .filter(|(_, _, _, state)| {
            state.status == AgentStatus::Running && state.has_target && !state.marked
        })
        .filter_map(|(entity, id, pos, state)| {
            let current = state.target_exit?;
            let crowded = exits.iter().find(|e| e.id == current).map_or(true, |e| e.overloaded);
            crowded.then_some(RerouteItem {
                entity,
                id: *id,
                position: pos.0,
                state: *state,
                rerouted: false,
            })
        })
        .collect();
    if items.is_empty() {
        return;
    }
    items.sort_by_key(|item| item.id);

    let config = &*config;
    let boundary = &*boundary;
    let exits = &exits;
    for_each_in_lanes(&mut items, pool.lanes_mut(), |item, rng| {
        let Some(current) = item.state.target_exit else {
            return;
        };
        let removed = !exits.iter().any(|e| e.id == current);
        if !removed && rng.gen_range(0.0..100.0) >= config.flee_probability {
            return;
        }
        if let Some((target, exit)) = reroute(item.position, current, exits, boundary, config) {
            item.state.flee_to(target, exit);
            item.state.marked = true;
            item.rerouted = true;
        }
    });

    let mut counters = TickCounters::default();
    for item in items.iter().filter(|item| item.rerouted) {
        if let Ok((_, _, _, mut state)) = agents.get_mut(item.entity) {
            *state = item.state;
        }
        debug!(agent = item.id.0, exit = ?item.state.target_exit, "agent turned away from crowded exit");
        counters.reroutes += 1;
    }
    stats.record(counters);
}

/// System that applies the panic broadcasts queued for this tick.
pub fn panic_broadcast_system(
    config: Res<SimConfig>,
    boundary: Res<AreaBoundary>,
    mut panic: ResMut<PanicState>,
    mut stats: ResMut<TickStats>,
    exits: Query<(&ExitId, &Position, &ExitStatus)>,
    mut agents: Query<(&Position, &mut AgentState)>,
) {
    if panic.pending.is_empty() {
        return;
    }
    let broadcasts = std::mem::take(&mut panic.pending);
    let exits = collect_exits(exits.iter());

    // An agent inside several radii flees once, attributed to the first broadcast.
    let mut hits = vec![0u64; broadcasts.len()];
    for (pos, mut state) in agents.iter_mut() {
        let Some(index) = broadcasts
            .iter()
            .position(|b| pos.0.horizontal_distance(&b.origin) <= b.radius)
        else {
            continue;
        };
        let (target, exit) = choose_exit(pos.0, &exits, &boundary, &config);
        state.flee_to(target, exit);
        hits[index] += 1;
    }
    for (broadcast, hit) in broadcasts.iter().zip(&hits) {
        info!(
            x = broadcast.origin.x,
            z = broadcast.origin.z,
            radius = broadcast.radius,
            affected = *hit,
            exits = exits.len(),
            "panic broadcast"
        );
    }
    let affected: u64 = hits.iter().sum();

    if affected > 0 {
        panic.active = true;
    }
    stats.record(TickCounters {
        panicked: affected,
        ..Default::default()
    });
}

/// System that clears the panic flag once no agent is running any more.
pub fn panic_settle_system(mut panic: ResMut<PanicState>, agents: Query<&AgentState>) {
    if panic.active && !agents.iter().any(|s| s.status == AgentStatus::Running) {
        panic.active = false;
        info!("panic settled");
    }
}
