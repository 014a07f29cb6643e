//! Tick counter and per-tick statistics.

use crate::components::AgentState;
use crate::systems::panic::PanicState;
use crate::world::StatusCounts;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use tracing::debug;

/// Resource tracking the current simulation tick.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// Counters for what the agents decided during a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickCounters {
    pub idle_rolls: u64,
    pub dance_rolls: u64,
    pub move_rolls: u64,
    pub targets_generated: u64,
    /// Target sampling ran out of attempts and the agent stayed put.
    pub target_fallbacks: u64,
    /// Running agents that turned away from an overloaded or removed exit.
    pub reroutes: u64,
    pub panicked: u64,
    pub exits_reached: u64,
}

impl TickCounters {
    /// Rolls that changed behaviour.
    pub fn total_rolls(&self) -> u64 {
        self.idle_rolls + self.dance_rolls + self.move_rolls
    }
}

impl AddAssign for TickCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.idle_rolls += rhs.idle_rolls;
        self.dance_rolls += rhs.dance_rolls;
        self.move_rolls += rhs.move_rolls;
        self.targets_generated += rhs.targets_generated;
        self.target_fallbacks += rhs.target_fallbacks;
        self.reroutes += rhs.reroutes;
        self.panicked += rhs.panicked;
        self.exits_reached += rhs.exits_reached;
    }
}

/// Statistics for the last tick and since the session started.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickStats {
    pub last: TickCounters,
    pub total: TickCounters,
}

impl TickStats {
    /// Forget the previous tick's counters.
    pub fn begin_tick(&mut self) {
        self.last = TickCounters::default();
    }

    pub fn record(&mut self, counters: TickCounters) {
        self.last += counters;
        self.total += counters;
    }
}

/// Logs a one-line summary of the finished tick.
pub fn tick_summary_system(
    tick: Res<SimTick>,
    stats: Res<TickStats>,
    panic: Res<PanicState>,
    agents: Query<&AgentState>,
) {
    let mut counts = StatusCounts::default();
    for state in agents.iter() {
        counts.add(state.status);
    }
    let last = &stats.last;
    debug!(
        tick = tick.0,
        idle = counts.idle,
        moving = counts.moving,
        dancing = counts.dancing,
        running = counts.running,
        rolls = last.total_rolls(),
        fallbacks = last.target_fallbacks,
        reroutes = last.reroutes,
        panic = panic.active,
        "tick finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates_total() {
        let mut stats = TickStats::default();
        stats.record(TickCounters {
            idle_rolls: 2,
            reroutes: 1,
            ..Default::default()
        });
        stats.begin_tick();
        stats.record(TickCounters {
            idle_rolls: 1,
            ..Default::default()
        });
        assert_eq!(stats.last.idle_rolls, 1);
        assert_eq!(stats.last.reroutes, 0);
        assert_eq!(stats.total.idle_rolls, 3);
        assert_eq!(stats.total.reroutes, 1);
    }
}
