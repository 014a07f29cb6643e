//! Spatial partitioning for crowd density queries.
//!
//! Ground positions hash to a single integer cell key,
//! `floor(x / cell) + y_multiplier * floor(z / cell)`, so neighbouring cells are a fixed
//! key offset apart: `±1` along x and `±y_multiplier` along z. Density around a point is
//! the occupancy of its own cell plus the eight cells around it.
//!
//! The grid is rebuilt from scratch every tick. Capacity for the tick is reserved before
//! the first insert and never grows while populating.

use crate::components::{EntityKind, Position, Vec3};
use crate::error::SimError;
use bevy_ecs::prelude::*;
use std::collections::HashMap;
use tracing::warn;

/// Default stride between grid rows. Keys stay unique while `|floor(x / cell)| < 500`.
pub const DEFAULT_Y_MULTIPLIER: i32 = 1000;

/// Check that every cell across `[min_x, max_x]`, plus one neighbour on each side, gets a
/// key of its own for the given cell size and row stride.
pub fn check_key_span(cell_size: f32, y_multiplier: i32, min_x: f32, max_x: f32) -> Result<(), SimError> {
    let cells = ((max_x as f64 - min_x as f64) / cell_size as f64).ceil() + 2.0;
    if cells < y_multiplier as f64 {
        Ok(())
    } else {
        Err(SimError::GridKeysCollide {
            cells_across: cells as u64,
            y_multiplier,
        })
    }
}

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub position: Vec3,
    pub kind: EntityKind,
}

/// Uniform grid over the ground plane.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    /// Cell size in world units.
    pub cell_size: f32,
    /// Key offset between two cells adjacent along z.
    pub y_multiplier: i32,
    /// Map from cell key to the entries in that cell.
    cells: HashMap<i32, Vec<SpatialEntry>>,
    /// Entries inserted since the last rebuild.
    len: usize,
    /// Entries reserved for this rebuild.
    capacity: usize,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(1.0, DEFAULT_Y_MULTIPLIER)
    }
}

impl SpatialGrid {
    /// Create a new spatial grid with the given cell size and row stride.
    pub fn new(cell_size: f32, y_multiplier: i32) -> Self {
        Self {
            cell_size,
            y_multiplier,
            cells: HashMap::new(),
            len: 0,
            capacity: 0,
        }
    }

    /// Cell key of a ground position.
    #[inline]
    pub fn key(&self, position: Vec3) -> i32 {
        let cx = (position.x / self.cell_size).floor() as i32;
        let cz = (position.z / self.cell_size).floor() as i32;
        cx.wrapping_add(self.y_multiplier.wrapping_mul(cz))
    }

    /// Clear all entries and reserve room for `expected` inserts.
    pub fn begin_rebuild(&mut self, expected: usize) {
        self.cells.clear();
        self.cells.reserve(expected);
        self.len = 0;
        self.capacity = expected;
    }

    /// Insert an entity at a position.
    ///
    /// Fails if the rebuild reserved fewer slots than are being filled.
    pub fn insert(&mut self, entity: Entity, position: Vec3, kind: EntityKind) -> Result<(), SimError> {
        let key = self.key(position);
        self.insert_keyed(key, SpatialEntry { entity, position, kind })
    }

    fn insert_keyed(&mut self, key: i32, entry: SpatialEntry) -> Result<(), SimError> {
        if self.len >= self.capacity {
            return Err(SimError::GridCapacityExceeded {
                capacity: self.capacity,
                attempted: self.len + 1,
            });
        }
        self.cells.entry(key).or_default().push(entry);
        self.len += 1;
        Ok(())
    }

    /// Rebuild the grid from a full set of entries.
    ///
    /// Keys are computed in parallel (with the `parallel` feature) into a private buffer
    /// and merged afterwards, so the shared map only ever has one writer.
    pub fn rebuild(&mut self, entries: &[SpatialEntry]) -> Result<(), SimError> {
        self.begin_rebuild(entries.len());

        #[cfg(feature = "parallel")]
        let keyed: Vec<(i32, SpatialEntry)> = {
            use rayon::prelude::*;
            entries.par_iter().map(|e| (self.key(e.position), *e)).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let keyed: Vec<(i32, SpatialEntry)> =
            entries.iter().map(|e| (self.key(e.position), *e)).collect();

        for (key, entry) in keyed {
            self.insert_keyed(key, entry)?;
        }
        Ok(())
    }

    /// Number of entries in one cell.
    pub fn cell_count(&self, key: i32) -> usize {
        self.cells.get(&key).map(|v| v.len()).unwrap_or(0)
    }

    /// Number of entries of one kind in one cell.
    pub fn cell_count_of(&self, key: i32, kind: EntityKind) -> usize {
        self.cells
            .get(&key)
            .map(|v| v.iter().filter(|e| e.kind == kind).count())
            .unwrap_or(0)
    }

    /// Keys of the `(2r + 1)²` cells centred on the cell holding `position`.
    ///
    /// With `radius_cells == 1` these are the own cell, `key ± 1`, `key ± y_multiplier`
    /// and the four diagonal combinations.
    pub fn neighborhood_keys(&self, position: Vec3, radius_cells: i32) -> impl Iterator<Item = i32> + '_ {
        let center = self.key(position);
        let r = radius_cells.max(0);
        (-r..=r).flat_map(move |dz| {
            (-r..=r).map(move |dx| {
                center
                    .wrapping_add(dx)
                    .wrapping_add(self.y_multiplier.wrapping_mul(dz))
            })
        })
    }

    /// Entries of every kind in the neighbourhood of `position`.
    pub fn count_near(&self, position: Vec3, radius_cells: i32) -> usize {
        self.neighborhood_keys(position, radius_cells)
            .map(|key| self.cell_count(key))
            .sum()
    }

    /// Entries of one kind in the neighbourhood of `position`.
    pub fn count_near_of(&self, position: Vec3, radius_cells: i32, kind: EntityKind) -> usize {
        self.neighborhood_keys(position, radius_cells)
            .map(|key| self.cell_count_of(key, kind))
            .sum()
    }

    /// Get total entity count.
    pub fn total_count(&self) -> usize {
        self.len
    }

    /// Slots reserved for the current rebuild.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// System that rebuilds the spatial grid from current agent and exit positions.
pub fn spatial_grid_update_system(
    mut grid: ResMut<SpatialGrid>,
    query: Query<(Entity, &Position, &EntityKind)>,
) {
    let entries: Vec<SpatialEntry> = query
        .iter()
        .map(|(entity, pos, kind)| SpatialEntry {
            entity,
            position: pos.0,
            kind: *kind,
        })
        .collect();

    if let Err(err) = grid.rebuild(&entries) {
        warn!("spatial grid rebuild failed: {err}");
    }
}
