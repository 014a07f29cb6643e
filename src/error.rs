//! Error types for the crowd simulation.

use thiserror::Error;

/// Reasons a venue boundary is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoundaryError {
    /// A corner has a NaN or infinite coordinate.
    #[error("boundary corner has a non-finite coordinate")]
    NonFinite,
    /// Corners are collinear or coincident, so the area collapses.
    #[error("boundary quadrilateral is degenerate (zero area)")]
    Degenerate,
    /// Opposite edges cross each other.
    #[error("boundary quadrilateral is self-intersecting")]
    SelfIntersecting,
}

/// Errors raised by the simulation API.
#[derive(Debug, Error)]
pub enum SimError {
    /// A configuration value cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// The venue boundary breaks the containment invariant.
    #[error("invalid boundary: {0}")]
    InvalidBoundary(#[from] BoundaryError),
    /// Configuration or snapshot JSON could not be read or written.
    #[error("JSON error: {0}")]
    ConfigParse(#[from] serde_json::Error),
    /// The venue is wider than one grid row, so cells on different rows would share a key.
    #[error("grid keys collide: venue spans {cells_across} cells along x, y_multiplier is {y_multiplier}")]
    GridKeysCollide { cells_across: u64, y_multiplier: i32 },
    /// More entries were inserted into the spatial grid than were reserved for the tick.
    #[error("spatial grid capacity exceeded ({attempted} > {capacity})")]
    GridCapacityExceeded { capacity: usize, attempted: usize },
}
