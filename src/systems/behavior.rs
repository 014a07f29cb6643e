//! Casual crowd behaviour - the weighted idle/dance/move roll and wander target sampling.

use crate::boundary::AreaBoundary;
use crate::components::*;
use crate::config::{BehaviorWeights, SimConfig};
use crate::rng::{for_each_in_lanes, RngPool};
use crate::systems::panic::PanicState;
use crate::systems::tick::{TickCounters, TickStats};
use bevy_ecs::prelude::*;
use rand::Rng;

/// Result of one behaviour roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollOutcome {
    Idle,
    Dance,
    Move,
    /// Keep doing whatever the agent was doing.
    Keep,
}

/// Map a die face in `0..dice_range` to an outcome.
pub fn outcome_for_face(face: u32, weights: &BehaviorWeights) -> RollOutcome {
    if face < weights.idle {
        RollOutcome::Idle
    } else if face < weights.idle + weights.dance {
        RollOutcome::Dance
    } else if face < weights.active_faces() {
        RollOutcome::Move
    } else {
        RollOutcome::Keep
    }
}

/// Throw the behaviour die once.
pub fn roll_behavior<R: Rng + ?Sized>(rng: &mut R, weights: &BehaviorWeights) -> RollOutcome {
    outcome_for_face(rng.gen_range(0..weights.dice_range), weights)
}

/// Draw a wander target for an agent, or `None` when every attempt was rejected.
///
/// Agents still inside the venue wander within `wander_offset` and must stay inside.
/// Agents that already made it out keep drifting away and must stay outside.
pub fn sample_target<R: Rng + ?Sized>(
    rng: &mut R,
    from: Vec3,
    exit_point_reached: bool,
    boundary: &AreaBoundary,
    config: &SimConfig,
) -> Option<Vec3> {
    let w = config.wander_offset;
    let outward = if exit_point_reached {
        let center = boundary.centroid();
        let (dx, dz) = (from.x - center.x, from.z - center.z);
        let len = (dx * dx + dz * dz).sqrt();
        if len < 1e-4 {
            (0.0, -config.exit_walk_offset)
        } else {
            (dx / len * config.exit_walk_offset, dz / len * config.exit_walk_offset)
        }
    } else {
        (0.0, 0.0)
    };

    for _ in 0..config.max_target_attempts {
        let candidate = Vec3::new(
            from.x + outward.0 + rng.gen_range(-w..w),
            config.resting_height,
            from.z + outward.1 + rng.gen_range(-w..w),
        );
        if boundary.contains(candidate) != exit_point_reached {
            return Some(candidate);
        }
    }
    None
}

struct RollItem {
    entity: Entity,
    id: AgentId,
    position: Vec3,
    state: AgentState,
    outcome: RollOutcome,
}

/// System that rolls the next casual behaviour for every agent without a target.
///
/// Skipped entirely while a panic is active.
pub fn behavior_roll_system(
    config: Res<SimConfig>,
    panic: Res<PanicState>,
    mut pool: ResMut<RngPool>,
    mut stats: ResMut<TickStats>,
    mut agents: Query<(Entity, &AgentId, &Position, &mut AgentState)>,
) {
    if panic.active {
        return;
    }

    let mut items: Vec<RollItem> = agents
        .iter()
        .filter(|(_, _, _, state)| !state.has_target)
        .map(|(entity, id, pos, state)| RollItem {
            entity,
            id: *id,
            position: pos.0,
            state: *state,
            outcome: RollOutcome::Keep,
        })
        .collect();
    items.sort_by_key(|item| item.id);

    let weights = config.behavior;
    for_each_in_lanes(&mut items, pool.lanes_mut(), |item, rng| {
        item.outcome = roll_behavior(rng, &weights);
        match item.outcome {
            RollOutcome::Idle => item.state.stay_at(AgentStatus::Idle, item.position),
            RollOutcome::Dance => item.state.stay_at(AgentStatus::Dancing, item.position),
            RollOutcome::Move => {
                item.state.status = AgentStatus::Moving;
                item.state.has_target = false;
                item.state.needs_target = true;
            }
            RollOutcome::Keep => {}
        }
    });

    let mut counters = TickCounters::default();
    for item in items.iter().filter(|item| item.outcome != RollOutcome::Keep) {
        match item.outcome {
            RollOutcome::Idle => counters.idle_rolls += 1,
            RollOutcome::Dance => counters.dance_rolls += 1,
            RollOutcome::Move => counters.move_rolls += 1,
            RollOutcome::Keep => {}
        }
        if let Ok((_, _, _, mut state)) = agents.get_mut(item.entity) {
            *state = item.state;
        }
    }
    stats.record(counters);
}

struct TargetItem {
    entity: Entity,
    id: AgentId,
    position: Vec3,
    state: AgentState,
    found: bool,
}

/// System that gives every agent that just started moving a validated target.
///
/// When sampling runs out of attempts the agent stays put and rolls again next tick.
pub fn target_generation_system(
    config: Res<SimConfig>,
    boundary: Res<AreaBoundary>,
    mut pool: ResMut<RngPool>,
    mut stats: ResMut<TickStats>,
    mut agents: Query<(Entity, &AgentId, &Position, &mut AgentState)>,
) {
    let mut items: Vec<TargetItem> = agents
        .iter()
        .filter(|(_, _, _, state)| state.needs_target && !state.has_target)
        .map(|(entity, id, pos, state)| TargetItem {
            entity,
            id: *id,
            position: pos.0,
            state: *state,
            found: false,
        })
        .collect();
    if items.is_empty() {
        return;
    }
    items.sort_by_key(|item| item.id);

    let config = &*config;
    let boundary = &*boundary;
    for_each_in_lanes(&mut items, pool.lanes_mut(), |item, rng| {
        let reached = item.state.exit_point_reached;
        match sample_target(rng, item.position, reached, boundary, config) {
            Some(target) => {
                item.state.target = target;
                item.state.has_target = true;
                item.state.needs_target = false;
                item.found = true;
            }
            None => item.state.stay_at(AgentStatus::Moving, item.position),
        }
    });

    let mut counters = TickCounters::default();
    for item in &items {
        if item.found {
            counters.targets_generated += 1;
        } else {
            counters.target_fallbacks += 1;
        }
        if let Ok((_, _, _, mut state)) = agents.get_mut(item.entity) {
            *state = item.state;
        }
    }
    stats.record(counters);
}
