//! Simulation tuning.
//!
//! Defaults reproduce the festival venue the crowd model was built for. A config can be
//! loaded from JSON; missing fields fall back to the defaults.

use crate::components::Vec3;
use crate::error::SimError;
use crate::spatial::check_key_span;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Weighted roll deciding what an agent without a target does next.
///
/// Each tick a die in `0..dice_range` is thrown per agent. The first `idle` faces mean
/// stand still, the next `dance` faces mean dance, the next `moving` faces mean walk
/// somewhere new. Everything else keeps the current behaviour. Only the ratios between
/// the weights and `dice_range` matter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviorWeights {
    pub dice_range: u32,
    pub idle: u32,
    pub dance: u32,
    pub moving: u32,
}

impl Default for BehaviorWeights {
    fn default() -> Self {
        Self {
            dice_range: 1000,
            idle: 3,
            dance: 5,
            moving: 2,
        }
    }
}

impl BehaviorWeights {
    /// Total number of faces that trigger a behaviour change.
    pub fn active_faces(&self) -> u32 {
        self.idle + self.dance + self.moving
    }

    /// Per-tick probability that a targetless agent changes behaviour.
    pub fn change_probability(&self) -> f32 {
        if self.dice_range == 0 {
            0.0
        } else {
            self.active_faces() as f32 / self.dice_range as f32
        }
    }
}

/// Inclusive-exclusive range a per-agent value is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min <= self.max
    }
}

/// Speed ranges agents draw from at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedRanges {
    pub move_speed: Range,
    pub run_speed: Range,
    pub jump_speed: Range,
    pub panic_jump_speed: Range,
}

impl Default for SpeedRanges {
    fn default() -> Self {
        Self {
            move_speed: Range::new(4.0, 5.0),
            run_speed: Range::new(3.0, 4.0),
            jump_speed: Range::new(2.0, 4.0),
            panic_jump_speed: Range::new(4.0, 5.0),
        }
    }
}

/// Corner points of the venue footprint as plain data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCorners {
    pub front_left: Vec3,
    pub front_right: Vec3,
    pub back_left: Vec3,
    pub back_right: Vec3,
}

impl Default for BoundaryCorners {
    fn default() -> Self {
        Self {
            front_left: Vec3::new(0.0, 0.0, 0.0),
            front_right: Vec3::new(50.0, 0.0, 0.0),
            back_left: Vec3::new(0.0, 0.0, 50.0),
            back_right: Vec3::new(50.0, 0.0, 50.0),
        }
    }
}

/// Configuration for the crowd simulation.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/30 = 0.0333 for 30 Hz).
    pub fixed_timestep: f32,
    /// Root seed for every random decision in a session.
    pub seed: u64,
    /// Number of per-worker generators. Fixed so runs match across machines.
    pub rng_lanes: usize,
    /// Edge length of a spatial grid cell in world units.
    pub cell_size: f32,
    /// Stride between grid rows in the integer cell key.
    pub grid_y_multiplier: i32,
    /// An exit is overloaded when strictly more agents than this are around it.
    pub overload_threshold: usize,
    pub behavior: BehaviorWeights,
    pub speeds: SpeedRanges,
    /// Half-width of the square a wander target is drawn from.
    pub wander_offset: f32,
    /// How far beyond the venue an agent heads once it made it out.
    pub exit_walk_offset: f32,
    pub max_target_attempts: u32,
    pub max_spawn_attempts: u32,
    /// Arrival distance for walking agents.
    pub move_arrival: f32,
    /// Arrival distance for running agents; exits are small targets.
    pub run_arrival: f32,
    pub resting_height: f32,
    pub jump_floor: f32,
    pub jump_ceiling: f32,
    /// Units per second an agent sinks back to resting height.
    pub settle_rate: f32,
    /// Percent chance per tick to turn away from an overloaded exit.
    pub flee_probability: f32,
    /// Trigger radius used when the host does not supply one.
    pub panic_radius: f32,
    /// Where agents flee when no exit is registered. `None` means straight out of the venue.
    pub fallback_exit: Option<Vec3>,
    pub initial_boundary: BoundaryCorners,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0, // 30 Hz
            seed: 1,
            rng_lanes: 8,
            cell_size: 1.0,
            grid_y_multiplier: 1000,
            overload_threshold: 10,
            behavior: BehaviorWeights::default(),
            speeds: SpeedRanges::default(),
            wander_offset: 3.0,
            exit_walk_offset: 6.0,
            max_target_attempts: 10,
            max_spawn_attempts: 64,
            move_arrival: 0.5,
            run_arrival: 0.1,
            resting_height: 0.5,
            jump_floor: 0.5,
            jump_ceiling: 0.9,
            settle_rate: 5.0,
            flee_probability: 15.55,
            panic_radius: 10.0,
            fallback_exit: None,
            initial_boundary: BoundaryCorners::default(),
        }
    }
}

impl SimConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value can drive a simulation.
    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.fixed_timestep > 0.0 && self.fixed_timestep.is_finite()) {
            return Err(SimError::InvalidConfig("fixed_timestep must be positive"));
        }
        if self.rng_lanes == 0 {
            return Err(SimError::InvalidConfig("rng_lanes must be at least 1"));
        }
        if !(self.cell_size > 0.0 && self.cell_size.is_finite()) {
            return Err(SimError::InvalidConfig("cell_size must be positive"));
        }
        if self.grid_y_multiplier < 2 {
            return Err(SimError::InvalidConfig("grid_y_multiplier must be at least 2"));
        }
        if self.behavior.dice_range == 0 {
            return Err(SimError::InvalidConfig("behavior.dice_range must be positive"));
        }
        if self.behavior.active_faces() > self.behavior.dice_range {
            return Err(SimError::InvalidConfig(
                "behavior weights exceed behavior.dice_range",
            ));
        }
        let speeds = &self.speeds;
        if !(speeds.move_speed.is_valid()
            && speeds.run_speed.is_valid()
            && speeds.jump_speed.is_valid()
            && speeds.panic_jump_speed.is_valid())
        {
            return Err(SimError::InvalidConfig("speed ranges must be positive and ordered"));
        }
        if !(self.wander_offset > 0.0 && self.exit_walk_offset > 0.0) {
            return Err(SimError::InvalidConfig("target offsets must be positive"));
        }
        if self.max_target_attempts == 0 || self.max_spawn_attempts == 0 {
            return Err(SimError::InvalidConfig("attempt budgets must be at least 1"));
        }
        if !(self.move_arrival > 0.0 && self.run_arrival > 0.0) {
            return Err(SimError::InvalidConfig("arrival thresholds must be positive"));
        }
        if self.jump_floor >= self.jump_ceiling {
            return Err(SimError::InvalidConfig("jump_floor must be below jump_ceiling"));
        }
        if self.settle_rate <= 0.0 {
            return Err(SimError::InvalidConfig("settle_rate must be positive"));
        }
        if !(0.0..=100.0).contains(&self.flee_probability) {
            return Err(SimError::InvalidConfig("flee_probability must be within 0..=100"));
        }
        if !(self.panic_radius >= 0.0 && self.panic_radius.is_finite()) {
            return Err(SimError::InvalidConfig("panic_radius must be non-negative"));
        }
        if let Some(point) = self.fallback_exit {
            if !point.is_finite() {
                return Err(SimError::InvalidConfig("fallback_exit must be finite"));
            }
        }
        let c = &self.initial_boundary;
        let xs = [c.front_left.x, c.front_right.x, c.back_left.x, c.back_right.x];
        // Non-finite corners are reported by the boundary check.
        if xs.iter().all(|x| x.is_finite()) {
            let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
            let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            check_key_span(self.cell_size, self.grid_y_multiplier, min_x, max_x)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_weights_ratio() {
        let weights = BehaviorWeights::default();
        assert_eq!(weights.active_faces(), 10);
        assert!((weights.change_probability() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SimConfig::from_json(r#"{ "seed": 42, "overload_threshold": 4 }"#).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.overload_threshold, 4);
        assert_eq!(config.rng_lanes, SimConfig::default().rng_lanes);
    }

    #[test]
    fn test_rejects_cells_too_fine_for_row_stride() {
        let config = SimConfig {
            cell_size: 0.04,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SimError::GridKeysCollide { y_multiplier: 1000, .. })
        ));

        let config = SimConfig {
            cell_size: 0.04,
            grid_y_multiplier: 2000,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = SimConfig {
            rng_lanes: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));

        let config = SimConfig {
            jump_floor: 1.0,
            jump_ceiling: 0.9,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SimConfig {
            behavior: BehaviorWeights {
                dice_range: 5,
                idle: 3,
                dance: 5,
                moving: 2,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            SimConfig::from_json("{ not json"),
            Err(SimError::ConfigParse(_))
        ));
    }
}
