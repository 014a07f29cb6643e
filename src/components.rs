//! ECS Components for the crowd simulation.
//!
//! Components are pure data containers attached to entities.
//! All behaviour lives in systems that query these components.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// A point in venue space (x = east/west, z = north/south, y = vertical offset).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the ground (x, z) plane. The vertical offset is ignored.
    pub fn horizontal_distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Current position of an agent or exit.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vec3);

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }
}

/// What an entity counts as in the spatial grid.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Agent,
    Exit,
}

// ============================================================================
// AGENT COMPONENTS
// ============================================================================

/// Stable identifier for an agent, unique within a session.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

/// Behavioural status of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentStatus {
    /// Standing still.
    #[default]
    Idle,
    /// Walking toward a target, or standing after having arrived.
    Moving,
    /// Bobbing in place.
    Dancing,
    /// Fleeing toward an exit.
    Running,
}

impl AgentStatus {
    pub const ALL: [AgentStatus; 4] = [
        AgentStatus::Idle,
        AgentStatus::Moving,
        AgentStatus::Dancing,
        AgentStatus::Running,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "Idle",
            AgentStatus::Moving => "Moving",
            AgentStatus::Dancing => "Dancing",
            AgentStatus::Running => "Running",
        }
    }

    /// Whether the vertical offset is allowed to leave the resting height.
    pub fn is_airborne(&self) -> bool {
        matches!(self, AgentStatus::Dancing | AgentStatus::Running)
    }
}

/// Per-agent behaviour state machine data.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub status: AgentStatus,
    pub target: Vec3,
    pub has_target: bool,
    /// Set once the agent reached the exit it was fleeing to.
    pub exit_point_reached: bool,
    /// The current target is a final exit point rather than a wander point.
    pub found_final_exit_point: bool,
    /// Turned around once already while fleeing; cleared on arrival.
    pub marked: bool,
    /// Entered `Moving` this tick and still needs a sampled target.
    pub needs_target: bool,
    /// Exit the agent is fleeing to, if the target is a registered exit.
    pub target_exit: Option<ExitId>,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            status: AgentStatus::Idle,
            target: Vec3::ZERO,
            has_target: false,
            exit_point_reached: false,
            found_final_exit_point: false,
            marked: false,
            needs_target: false,
            target_exit: None,
        }
    }
}

impl AgentState {
    /// Drop the current target and stay where the agent stands.
    pub fn stay_at(&mut self, status: AgentStatus, here: Vec3) {
        self.status = status;
        self.target = here;
        self.has_target = false;
        self.needs_target = false;
    }

    /// Switch to fleeing toward `target`.
    pub fn flee_to(&mut self, target: Vec3, exit: Option<ExitId>) {
        self.status = AgentStatus::Running;
        self.target = target;
        self.has_target = true;
        self.needs_target = false;
        self.found_final_exit_point = true;
        self.exit_point_reached = false;
        self.marked = false;
        self.target_exit = exit;
    }
}

/// Per-agent speeds, drawn from configured ranges at spawn.
///
/// The jump speeds carry a sign: it flips whenever the bob crosses a bound.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveSpeed {
    pub move_speed: f32,
    pub run_speed: f32,
    pub jump_speed: f32,
    pub panic_jump_speed: f32,
}

impl Default for MoveSpeed {
    fn default() -> Self {
        Self {
            move_speed: 4.5,
            run_speed: 3.5,
            jump_speed: 3.0,
            panic_jump_speed: 4.5,
        }
    }
}

/// Bundle of all components for an agent entity.
#[derive(Bundle, Clone)]
pub struct AgentBundle {
    pub id: AgentId,
    pub position: Position,
    pub state: AgentState,
    pub speed: MoveSpeed,
    pub kind: EntityKind,
}

impl AgentBundle {
    pub fn new(id: u32, position: Vec3, speed: MoveSpeed) -> Self {
        Self {
            id: AgentId(id),
            position: Position(position),
            state: AgentState {
                target: position,
                ..AgentState::default()
            },
            speed,
            kind: EntityKind::Agent,
        }
    }
}

// ============================================================================
// EXIT COMPONENTS
// ============================================================================

/// Stable identifier for a user-placed exit.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExitId(pub u32);

/// Density around an exit, refreshed every tick from the spatial grid.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub nearby_count: usize,
    pub overloaded: bool,
}

/// Bundle of all components for an exit entity.
#[derive(Bundle, Clone)]
pub struct ExitBundle {
    pub id: ExitId,
    pub position: Position,
    pub status: ExitStatus,
    pub kind: EntityKind,
}

impl ExitBundle {
    pub fn new(id: u32, position: Vec3) -> Self {
        Self {
            id: ExitId(id),
            position: Position(position),
            status: ExitStatus::default(),
            kind: EntityKind::Exit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.5, 0.0);
        let b = Vec3::new(3.0, 0.9, 4.0);
        assert!((a.horizontal_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_flee_to_resets_exit_flags() {
        let mut state = AgentState {
            exit_point_reached: true,
            marked: true,
            ..AgentState::default()
        };
        state.flee_to(Vec3::new(1.0, 0.5, 2.0), Some(ExitId(7)));
        assert_eq!(state.status, AgentStatus::Running);
        assert!(state.has_target);
        assert!(state.found_final_exit_point);
        assert!(!state.exit_point_reached);
        assert!(!state.marked);
        assert_eq!(state.target_exit, Some(ExitId(7)));
    }
}
