//! Crowd Sim - Panic Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation of a festival crowd that dances, wanders
//! and, when a panic is triggered, flees toward the least crowded exit.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod boundary;
pub mod bridge;
pub mod commands;
pub mod components;
pub mod config;
pub mod error;
pub mod rng;
pub mod spatial;
pub mod systems;
pub mod world;

pub use api::SimWorld;
pub use boundary::AreaBoundary;
pub use commands::SimCommand;
pub use components::*;
pub use config::{BehaviorWeights, BoundaryCorners, SimConfig, SpeedRanges};
pub use error::{BoundaryError, SimError};
pub use rng::RngPool;
pub use spatial::{SpatialEntry, SpatialGrid};
pub use systems::*;
pub use world::{AgentSnapshot, ExitSnapshot, Snapshot, StatusCounts};
