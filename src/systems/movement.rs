//! Movement system - walks and runs agents toward their targets and bobs dancers.

use crate::components::*;
use crate::config::SimConfig;
use crate::systems::tick::{TickCounters, TickStats};
use bevy_ecs::prelude::*;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// What happened to an agent during one movement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    None,
    /// Reached a wander target.
    Arrived,
    /// Reached the exit it was fleeing to.
    ReachedExit,
}

/// Advance one agent by `dt`. Only reads and writes the agent's own data.
pub fn step_agent(
    position: &mut Vec3,
    state: &mut AgentState,
    speed: &mut MoveSpeed,
    config: &SimConfig,
    dt: f32,
) -> StepOutcome {
    let mut outcome = StepOutcome::None;

    match state.status {
        AgentStatus::Moving if state.has_target => {
            if walk_toward(position, state.target, speed.move_speed * dt, config.move_arrival) {
                state.has_target = false;
                outcome = StepOutcome::Arrived;
            }
        }
        AgentStatus::Running if state.has_target => {
            if walk_toward(position, state.target, speed.run_speed * dt, config.run_arrival) {
                state.has_target = false;
                state.marked = false;
                if state.found_final_exit_point {
                    state.status = AgentStatus::Moving;
                    state.exit_point_reached = true;
                    state.found_final_exit_point = false;
                    state.target_exit = None;
                    outcome = StepOutcome::ReachedExit;
                } else {
                    outcome = StepOutcome::Arrived;
                }
            } else {
                bob(position, &mut speed.panic_jump_speed, config, dt);
            }
        }
        _ => {}
    }

    match state.status {
        AgentStatus::Dancing => bob(position, &mut speed.jump_speed, config, dt),
        AgentStatus::Idle | AgentStatus::Moving if position.y > config.resting_height => {
            position.y = (position.y - config.settle_rate * dt).max(config.resting_height);
        }
        _ => {}
    }

    outcome
}

/// Move across the ground toward `target`. Returns true once within `arrival` of it.
fn walk_toward(position: &mut Vec3, target: Vec3, step: f32, arrival: f32) -> bool {
    let distance = position.horizontal_distance(&target);
    if distance < arrival {
        return true;
    }
    if step >= distance {
        position.x = target.x;
        position.z = target.z;
    } else {
        let scale = step / distance;
        position.x += (target.x - position.x) * scale;
        position.z += (target.z - position.z) * scale;
    }
    false
}

/// Ping-pong the vertical offset between the jump floor and ceiling.
fn bob(position: &mut Vec3, jump_speed: &mut f32, config: &SimConfig, dt: f32) {
    position.y += *jump_speed * dt;
    if position.y >= config.jump_ceiling {
        position.y = config.jump_ceiling;
        *jump_speed = -jump_speed.abs();
    } else if position.y <= config.jump_floor {
        position.y = config.jump_floor;
        *jump_speed = jump_speed.abs();
    }
}

/// System that steps every agent.
pub fn movement_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    mut stats: ResMut<TickStats>,
    mut query: Query<(&mut Position, &mut AgentState, &mut MoveSpeed)>,
) {
    let delta = dt.0;
    let mut counters = TickCounters::default();
    for (mut pos, mut state, mut speed) in query.iter_mut() {
        let outcome = step_agent(&mut pos.0, &mut state, &mut speed, &config, delta);
        if outcome == StepOutcome::ReachedExit {
            counters.exits_reached += 1;
        }
    }
    stats.record(counters);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving_to(target: Vec3) -> AgentState {
        AgentState {
            status: AgentStatus::Moving,
            target,
            has_target: true,
            ..AgentState::default()
        }
    }

    #[test]
    fn test_movement_walks_toward_target() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(0.1));
        world.insert_resource(SimConfig::default());
        world.insert_resource(TickStats::default());

        world.spawn((
            Position::new(0.0, 0.5, 0.0),
            moving_to(Vec3::new(10.0, 0.5, 0.0)),
            MoveSpeed {
                move_speed: 4.0,
                ..MoveSpeed::default()
            },
        ));

        let mut schedule = Schedule::default();
        schedule.add_systems(movement_system);
        schedule.run(&mut world);

        let mut query = world.query::<&Position>();
        let pos = query.single(&world);
        assert!((pos.0.x - 0.4).abs() < 0.001);
        assert!(pos.0.z.abs() < 0.001);
    }

    #[test]
    fn test_target_at_position_clears_in_one_step() {
        let config = SimConfig::default();
        let mut pos = Vec3::new(3.0, 0.5, 3.0);
        let mut state = moving_to(pos);
        let mut speed = MoveSpeed::default();
        let outcome = step_agent(&mut pos, &mut state, &mut speed, &config, 1.0 / 30.0);
        assert_eq!(outcome, StepOutcome::Arrived);
        assert!(!state.has_target);
        assert_eq!(state.status, AgentStatus::Moving);
    }

    #[test]
    fn test_does_not_overshoot() {
        let config = SimConfig::default();
        let mut pos = Vec3::new(0.0, 0.5, 0.0);
        let target = Vec3::new(0.0, 0.5, 0.6);
        let mut state = moving_to(target);
        let mut speed = MoveSpeed::default();
        step_agent(&mut pos, &mut state, &mut speed, &config, 1.0);
        assert_eq!((pos.x, pos.z), (target.x, target.z));
        assert!(state.has_target);
        step_agent(&mut pos, &mut state, &mut speed, &config, 1.0);
        assert!(!state.has_target);
    }

    #[test]
    fn test_running_to_exit_marks_exit_reached() {
        let config = SimConfig::default();
        let mut pos = Vec3::new(0.0, 0.7, 0.0);
        let mut state = AgentState::default();
        state.flee_to(Vec3::new(0.05, 0.5, 0.0), Some(ExitId(1)));
        state.marked = true;
        let mut speed = MoveSpeed::default();
        let outcome = step_agent(&mut pos, &mut state, &mut speed, &config, 1.0 / 30.0);
        assert_eq!(outcome, StepOutcome::ReachedExit);
        assert_eq!(state.status, AgentStatus::Moving);
        assert!(state.exit_point_reached);
        assert!(!state.has_target);
        assert!(!state.marked);
    }

    #[test]
    fn test_running_arrival_uses_tight_threshold() {
        let config = SimConfig::default();
        let mut pos = Vec3::new(0.0, 0.5, 0.0);
        let mut state = AgentState::default();
        state.flee_to(Vec3::new(0.3, 0.5, 0.0), None);
        let mut speed = MoveSpeed::default();
        // 0.3 away counts as arrived for walkers, not for runners.
        let outcome = step_agent(&mut pos, &mut state, &mut speed, &config, 0.0);
        assert_eq!(outcome, StepOutcome::None);
        assert!(state.has_target);
    }

    #[test]
    fn test_dancing_stays_between_bounds() {
        let config = SimConfig::default();
        let mut pos = Vec3::new(1.0, 0.5, 1.0);
        let mut state = AgentState {
            status: AgentStatus::Dancing,
            ..AgentState::default()
        };
        let mut speed = MoveSpeed::default();
        let mut flips = 0;
        let mut last_sign = speed.jump_speed.signum();
        for _ in 0..300 {
            step_agent(&mut pos, &mut state, &mut speed, &config, 1.0 / 30.0);
            assert!(pos.y >= config.jump_floor - 1e-6 && pos.y <= config.jump_ceiling + 1e-6);
            if speed.jump_speed.signum() != last_sign {
                flips += 1;
                last_sign = speed.jump_speed.signum();
            }
        }
        assert!(flips > 2);
        assert_eq!((pos.x, pos.z), (1.0, 1.0));
    }

    #[test]
    fn test_idle_settles_linearly() {
        let config = SimConfig::default();
        let mut pos = Vec3::new(0.0, 0.9, 0.0);
        let mut state = AgentState::default();
        let mut speed = MoveSpeed::default();
        step_agent(&mut pos, &mut state, &mut speed, &config, 0.04);
        assert!((pos.y - 0.7).abs() < 1e-5);
        step_agent(&mut pos, &mut state, &mut speed, &config, 1.0);
        assert_eq!(pos.y, config.resting_height);
    }
}
