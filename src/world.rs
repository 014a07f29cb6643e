//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable view of the simulation state
//! that a host can render or show in its statistics panels.

use crate::components::*;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single agent's state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub status: AgentStatus,
    pub has_target: bool,
    pub exit_point_reached: bool,
}

/// Snapshot of an exit and the crowd around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub nearby_count: usize,
    pub overloaded: bool,
}

/// Number of agents per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub idle: usize,
    pub moving: usize,
    pub dancing: usize,
    pub running: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: AgentStatus) {
        match status {
            AgentStatus::Idle => self.idle += 1,
            AgentStatus::Moving => self.moving += 1,
            AgentStatus::Dancing => self.dancing += 1,
            AgentStatus::Running => self.running += 1,
        }
    }

    pub fn get(&self, status: AgentStatus) -> usize {
        match status {
            AgentStatus::Idle => self.idle,
            AgentStatus::Moving => self.moving,
            AgentStatus::Dancing => self.dancing,
            AgentStatus::Running => self.running,
        }
    }

    pub fn total(&self) -> usize {
        self.idle + self.moving + self.dancing + self.running
    }
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    /// Whether a panic is under way.
    pub panic_active: bool,
    /// All agents, ordered by id.
    pub agents: Vec<AgentSnapshot>,
    /// All exits, ordered by id.
    pub exits: Vec<ExitSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32, panic_active: bool) -> Self {
        Self {
            tick,
            time,
            panic_active,
            agents: agent_snapshots(world),
            exits: exit_snapshots(world),
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub fn agent_snapshots(world: &mut World) -> Vec<AgentSnapshot> {
    let mut query = world.query::<(&AgentId, &Position, &AgentState)>();
    let mut agents: Vec<AgentSnapshot> = query
        .iter(world)
        .map(|(id, pos, state)| AgentSnapshot {
            id: id.0,
            x: pos.0.x,
            y: pos.0.y,
            z: pos.0.z,
            status: state.status,
            has_target: state.has_target,
            exit_point_reached: state.exit_point_reached,
        })
        .collect();
    agents.sort_by_key(|a| a.id);
    agents
}

pub fn exit_snapshots(world: &mut World) -> Vec<ExitSnapshot> {
    let mut query = world.query::<(&ExitId, &Position, &ExitStatus)>();
    let mut exits: Vec<ExitSnapshot> = query
        .iter(world)
        .map(|(id, pos, status)| ExitSnapshot {
            id: id.0,
            x: pos.0.x,
            y: pos.0.y,
            z: pos.0.z,
            nearby_count: status.nearby_count,
            overloaded: status.overloaded,
        })
        .collect();
    exits.sort_by_key(|e| e.id);
    exits
}
