//! Host commands.
//!
//! Structural changes are queued and applied at the start of the next tick, never while a
//! tick is running.

use crate::boundary::AreaBoundary;
use crate::components::Vec3;

/// A change requested by the host application.
#[derive(Debug, Clone, PartialEq)]
pub enum SimCommand {
    /// Spawn agents at random positions inside the venue.
    SpawnAgents(usize),
    /// Spawn one agent at each given position.
    SpawnAgentsAt(Vec<Vec3>),
    /// Remove every agent.
    ClearAgents,
    PlaceExit(Vec3),
    /// Remove every exit.
    ClearExits,
    /// Replace the venue footprint. The boundary is already validated.
    UpdateBoundary(AreaBoundary),
    TriggerPanic { origin: Vec3, radius: f32 },
}

impl SimCommand {
    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            SimCommand::SpawnAgents(_) => "spawn_agents",
            SimCommand::SpawnAgentsAt(_) => "spawn_agents_at",
            SimCommand::ClearAgents => "clear_agents",
            SimCommand::PlaceExit(_) => "place_exit",
            SimCommand::ClearExits => "clear_exits",
            SimCommand::UpdateBoundary(_) => "update_boundary",
            SimCommand::TriggerPanic { .. } => "trigger_panic",
        }
    }
}
