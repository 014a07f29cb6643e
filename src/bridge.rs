//! Engine Integration Bridge
//!
//! Converts simulation snapshots into a flat `f32` buffer that an engine host can read
//! without parsing JSON every frame.
//!
//! # Stable FFI Contract
//!
//! The format is designed for:
//! - **Efficiency**: Contiguous f32 array, no allocations on the host side
//! - **Simplicity**: Fixed strides, predictable layout
//! - **Stability**: Field order and count are versioned and documented
//!
//! # Buffer Layout (Version 1.0)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ HEADER (3 elements)                                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ [0] agent_count (as f32)                                        │
//! │ [1] exit_count (as f32)                                         │
//! │ [2] panic_active (1.0 / 0.0)                                    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ AGENT DATA (agent_count × AGENT_STRIDE elements)                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ For each agent i (offset = 3 + i * AGENT_STRIDE):               │
//! │   [+0] id                 - Agent ID (u32 as f32)               │
//! │   [+1] x                  - X position (world units)            │
//! │   [+2] y                  - Vertical offset (bob height)        │
//! │   [+3] z                  - Z position (world units)            │
//! │   [+4] status             - Status (see STATUS_* constants)     │
//! │   [+5] has_target         - 1.0 / 0.0                           │
//! │   [+6] exit_point_reached - 1.0 / 0.0                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ EXIT DATA (exit_count × EXIT_STRIDE elements), after the agents │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   [+0] id, [+1] x, [+2] y, [+3] z,                              │
//! │   [+4] nearby_count, [+5] overloaded (1.0 / 0.0)                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Status Mapping
//!
//! | Status  | ID  |
//! |---------|-----|
//! | Idle    | 0.0 |
//! | Moving  | 1.0 |
//! | Dancing | 2.0 |
//! | Running | 3.0 |
//!
//! # Determinism
//!
//! Snapshots list agents and exits by id, so the same state always produces the same buffer.

use crate::components::AgentStatus;
use crate::world::Snapshot;

// ============================================================================
// CONSTANTS - STABLE FFI CONTRACT
// ============================================================================

/// Number of f32 values in the buffer header: agent count, exit count, panic flag.
pub const HEADER_SIZE: usize = 3;

/// Number of f32 values per agent.
///
/// **This is part of the stable FFI contract. Do not change without versioning.**
pub const AGENT_STRIDE: usize = 7;

/// Number of f32 values per exit.
pub const EXIT_STRIDE: usize = 6;

pub const STATUS_IDLE: f32 = 0.0;
pub const STATUS_MOVING: f32 = 1.0;
pub const STATUS_DANCING: f32 = 2.0;
pub const STATUS_RUNNING: f32 = 3.0;

// Agent field offsets
pub const FIELD_ID: usize = 0;
pub const FIELD_X: usize = 1;
pub const FIELD_Y: usize = 2;
pub const FIELD_Z: usize = 3;
pub const FIELD_STATUS: usize = 4;
pub const FIELD_HAS_TARGET: usize = 5;
pub const FIELD_EXIT_REACHED: usize = 6;

// Exit field offsets (id, x, y, z share the agent offsets)
pub const FIELD_NEARBY_COUNT: usize = 4;
pub const FIELD_OVERLOADED: usize = 5;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

#[inline]
pub fn status_to_id(status: AgentStatus) -> f32 {
    match status {
        AgentStatus::Idle => STATUS_IDLE,
        AgentStatus::Moving => STATUS_MOVING,
        AgentStatus::Dancing => STATUS_DANCING,
        AgentStatus::Running => STATUS_RUNNING,
    }
}

#[inline]
fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}

/// Calculate the required buffer size for the given counts.
#[inline]
pub const fn calculate_buffer_size(agent_count: usize, exit_count: usize) -> usize {
    HEADER_SIZE + agent_count * AGENT_STRIDE + exit_count * EXIT_STRIDE
}

/// Offset of agent `index`.
#[inline]
pub const fn agent_offset(index: usize) -> usize {
    HEADER_SIZE + index * AGENT_STRIDE
}

/// Offset of exit `index`; exits follow all agents.
#[inline]
pub const fn exit_offset(agent_count: usize, index: usize) -> usize {
    HEADER_SIZE + agent_count * AGENT_STRIDE + index * EXIT_STRIDE
}

/// Parse `(agent_count, exit_count)` from a flat buffer.
///
/// Returns `None` if the header is incomplete.
pub fn parse_counts(buffer: &[f32]) -> Option<(usize, usize)> {
    if buffer.len() < HEADER_SIZE {
        return None;
    }
    Some((buffer[0] as usize, buffer[1] as usize))
}

// ============================================================================
// MAIN SERIALIZATION FUNCTION
// ============================================================================

/// Convert a simulation snapshot to a flat buffer for FFI transfer.
///
/// # Example
///
/// ```rust
/// use crowd_sim::api::SimWorld;
/// use crowd_sim::bridge::{snapshot_to_flatbuffer, calculate_buffer_size, parse_counts};
///
/// let mut sim = SimWorld::new();
/// sim.spawn_agents(4);
/// sim.tick();
/// let buffer = snapshot_to_flatbuffer(&sim.snapshot());
///
/// let (agents, exits) = parse_counts(&buffer).unwrap();
/// assert_eq!(buffer.len(), calculate_buffer_size(agents, exits));
/// ```
pub fn snapshot_to_flatbuffer(snapshot: &Snapshot) -> Vec<f32> {
    let agent_count = snapshot.agents.len();
    let exit_count = snapshot.exits.len();
    let buffer_size = calculate_buffer_size(agent_count, exit_count);

    let mut buffer = Vec::with_capacity(buffer_size);

    buffer.push(agent_count as f32);
    buffer.push(exit_count as f32);
    buffer.push(flag(snapshot.panic_active));

    for agent in &snapshot.agents {
        buffer.extend_from_slice(&[
            agent.id as f32,
            agent.x,
            agent.y,
            agent.z,
            status_to_id(agent.status),
            flag(agent.has_target),
            flag(agent.exit_point_reached),
        ]);
    }

    for exit in &snapshot.exits {
        buffer.extend_from_slice(&[
            exit.id as f32,
            exit.x,
            exit.y,
            exit.z,
            exit.nearby_count as f32,
            flag(exit.overloaded),
        ]);
    }

    debug_assert_eq!(buffer.len(), buffer_size, "Buffer size mismatch");
    buffer
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SimWorld;
    use crate::components::Vec3;

    #[test]
    fn test_snapshot_to_flatbuffer_empty() {
        let mut sim = SimWorld::new();
        let buffer = snapshot_to_flatbuffer(&sim.snapshot());
        assert_eq!(buffer, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_snapshot_to_flatbuffer_layout() {
        let mut sim = SimWorld::new();
        sim.spawn_agents_at(vec![Vec3::new(10.0, 0.5, 20.0), Vec3::new(30.0, 0.5, 40.0)]);
        sim.place_exit(Vec3::new(0.0, 0.5, 25.0));
        sim.tick();

        let snapshot = sim.snapshot();
        let buffer = snapshot_to_flatbuffer(&snapshot);
        assert_eq!(buffer.len(), calculate_buffer_size(2, 1));
        assert_eq!(parse_counts(&buffer), Some((2, 1)));

        for (i, agent) in snapshot.agents.iter().enumerate() {
            let offset = agent_offset(i);
            assert_eq!(buffer[offset + FIELD_ID], agent.id as f32);
            assert_eq!(buffer[offset + FIELD_X], agent.x);
            assert_eq!(buffer[offset + FIELD_Z], agent.z);
            assert_eq!(buffer[offset + FIELD_STATUS], status_to_id(agent.status));
        }

        let offset = exit_offset(2, 0);
        assert_eq!(buffer[offset + FIELD_ID], 0.0);
        assert_eq!(buffer[offset + FIELD_X], 0.0);
        assert_eq!(buffer[offset + FIELD_Z], 25.0);
        assert_eq!(buffer[offset + FIELD_OVERLOADED], 0.0);
    }

    #[test]
    fn test_panic_flag_and_running_status() {
        let mut sim = SimWorld::new();
        sim.spawn_agents_at(vec![Vec3::new(25.0, 0.5, 25.0)]);
        sim.place_exit(Vec3::new(0.0, 0.5, 25.0));
        sim.tick();
        sim.trigger_panic(Vec3::new(25.0, 0.5, 25.0), 5.0);
        sim.tick();

        let buffer = snapshot_to_flatbuffer(&sim.snapshot());
        assert_eq!(buffer[2], 1.0);
        assert_eq!(buffer[agent_offset(0) + FIELD_STATUS], STATUS_RUNNING);
        assert_eq!(buffer[agent_offset(0) + FIELD_HAS_TARGET], 1.0);
    }

    #[test]
    fn test_snapshot_to_flatbuffer_determinism() {
        let run = || {
            let mut sim = SimWorld::new();
            sim.spawn_agents(20);
            sim.place_exit(Vec3::new(50.0, 0.5, 25.0));
            for _ in 0..30 {
                sim.tick();
            }
            snapshot_to_flatbuffer(&sim.snapshot())
        };
        assert_eq!(run(), run(), "Buffers are not identical - determinism violated");
    }

    #[test]
    fn test_parse_counts_short_buffer() {
        assert_eq!(parse_counts(&[]), None);
        assert_eq!(parse_counts(&[1.0, 2.0]), None);
    }

    #[test]
    fn test_offsets() {
        assert_eq!(agent_offset(0), HEADER_SIZE);
        assert_eq!(agent_offset(10), HEADER_SIZE + 10 * AGENT_STRIDE);
        assert_eq!(exit_offset(0, 0), HEADER_SIZE);
        assert_eq!(exit_offset(3, 1), HEADER_SIZE + 3 * AGENT_STRIDE + EXIT_STRIDE);
        assert_eq!(AGENT_STRIDE, FIELD_EXIT_REACHED + 1);
        assert_eq!(EXIT_STRIDE, FIELD_OVERLOADED + 1);
    }
}
