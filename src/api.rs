//! Public API for the simulation.
//!
//! This module provides the main interface for a host application (engine plugin, demo,
//! test harness) to drive the crowd simulation.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 30 Hz). When `step(dt)` is called,
//! the simulation accumulates time and runs fixed updates as needed. `tick()` runs exactly
//! one fixed update.
//!
//! ## Commands
//!
//! Spawning, clearing, exit placement, boundary changes and panic triggers are queued with
//! `submit` (or the convenience wrappers) and applied at the start of the next fixed update.

use crate::boundary::AreaBoundary;
use crate::commands::SimCommand;
use crate::components::*;
use crate::config::{Range, SimConfig, SpeedRanges};
use crate::error::SimError;
use crate::rng::RngPool;
use crate::spatial::{check_key_span, spatial_grid_update_system, SpatialGrid};
use crate::systems::*;
use crate::world::{agent_snapshots, exit_snapshots, AgentSnapshot, ExitSnapshot, Snapshot, StatusCounts};
use bevy_ecs::prelude::*;
use rand::Rng;
use tracing::{debug, info, warn};

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Initializing the simulation
/// - Queueing host commands
/// - Stepping the simulation forward
/// - Extracting state snapshots and statistics
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
    /// Commands waiting for the next fixed update.
    pending: Vec<SimCommand>,
    next_agent_id: u32,
    next_exit_id: u32,
}

impl SimWorld {
    /// Create a new empty simulation world with the default venue.
    pub fn new() -> Self {
        Self::build(SimConfig::default(), AreaBoundary::default())
    }

    /// Create a new simulation world with custom configuration.
    pub fn with_config(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        let boundary = AreaBoundary::from_corners(config.initial_boundary)?;
        Ok(Self::build(config, boundary))
    }

    /// Load the configuration from JSON and create a world with it.
    pub fn from_json_config(json: &str) -> Result<Self, SimError> {
        Self::with_config(SimConfig::from_json(json)?)
    }

    fn build(config: SimConfig, boundary: AreaBoundary) -> Self {
        let mut world = World::new();

        // Core resources
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SimTick(0));
        world.insert_resource(SpatialGrid::new(config.cell_size, config.grid_y_multiplier));
        world.insert_resource(boundary);
        world.insert_resource(RngPool::new(config.seed, config.rng_lanes));
        world.insert_resource(PanicState::default());
        world.insert_resource(TickStats::default());
        world.insert_resource(config);

        // One tick, in fixed order.
        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                spatial_grid_update_system,
                congestion_system,
                exit_reroute_system,
                behavior_roll_system,
                target_generation_system,
                movement_system,
                panic_broadcast_system,
                panic_settle_system,
                tick_summary_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
            pending: Vec::new(),
            next_agent_id: 0,
            next_exit_id: 0,
        }
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    /// Queue a command for the next fixed update.
    pub fn submit(&mut self, command: SimCommand) {
        self.pending.push(command);
    }

    /// Number of commands waiting for the next fixed update.
    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }

    pub fn spawn_agents(&mut self, count: usize) {
        self.submit(SimCommand::SpawnAgents(count));
    }

    pub fn spawn_agents_at(&mut self, positions: Vec<Vec3>) {
        self.submit(SimCommand::SpawnAgentsAt(positions));
    }

    pub fn clear_agents(&mut self) {
        self.submit(SimCommand::ClearAgents);
    }

    pub fn place_exit(&mut self, position: Vec3) {
        self.submit(SimCommand::PlaceExit(position));
    }

    pub fn clear_exits(&mut self) {
        self.submit(SimCommand::ClearExits);
    }

    /// Replace the venue footprint.
    ///
    /// The corners are checked right away; a degenerate or self-intersecting shape, or one
    /// too wide for the grid's row stride, is rejected here and never reaches the simulation.
    pub fn update_boundary(
        &mut self,
        front_left: Vec3,
        front_right: Vec3,
        back_left: Vec3,
        back_right: Vec3,
    ) -> Result<(), SimError> {
        let boundary = AreaBoundary::new(front_left, front_right, back_left, back_right)?;
        if let Some(config) = self.world.get_resource::<SimConfig>() {
            let (min_x, max_x, _, _) = boundary.bounds();
            check_key_span(config.cell_size, config.grid_y_multiplier, min_x, max_x)?;
        }
        self.submit(SimCommand::UpdateBoundary(boundary));
        Ok(())
    }

    /// Make every agent within `radius` of `origin` flee.
    pub fn trigger_panic(&mut self, origin: Vec3, radius: f32) {
        self.submit(SimCommand::TriggerPanic { origin, radius });
    }

    /// Trigger a panic with the configured default radius.
    pub fn trigger_panic_default(&mut self, origin: Vec3) {
        let radius = self.world.resource::<SimConfig>().panic_radius;
        self.trigger_panic(origin, radius);
    }

    fn apply_commands(&mut self) {
        for command in std::mem::take(&mut self.pending) {
            debug!(command = command.name(), "applying command");
            match command {
                SimCommand::SpawnAgents(count) => self.spawn_random_agents(count),
                SimCommand::SpawnAgentsAt(positions) => self.spawn_agents_now(positions),
                SimCommand::ClearAgents => {
                    let removed = self.despawn_all::<AgentId>();
                    info!(removed, "agents cleared");
                }
                SimCommand::PlaceExit(position) => {
                    let id = self.next_exit_id;
                    self.next_exit_id += 1;
                    self.world.spawn(ExitBundle::new(id, position));
                    info!(id, x = position.x, z = position.z, "exit placed");
                }
                SimCommand::ClearExits => {
                    let removed = self.despawn_all::<ExitId>();
                    info!(removed, "exits cleared");
                }
                SimCommand::UpdateBoundary(boundary) => {
                    let (min_x, max_x, min_z, max_z) = boundary.bounds();
                    self.world.insert_resource(boundary);
                    info!(min_x, max_x, min_z, max_z, "boundary updated");
                }
                SimCommand::TriggerPanic { origin, radius } => {
                    self.world.resource_mut::<PanicState>().broadcast(origin, radius);
                }
            }
        }
    }

    fn despawn_all<C: Component>(&mut self) -> usize {
        let mut query = self.world.query_filtered::<Entity, With<C>>();
        let entities: Vec<Entity> = query.iter(&self.world).collect();
        for &entity in &entities {
            self.world.despawn(entity);
        }
        entities.len()
    }

    fn spawn_random_agents(&mut self, count: usize) {
        let config = self.world.resource::<SimConfig>().clone();
        let boundary = self.world.resource::<AreaBoundary>().clone();

        let mut positions = Vec::with_capacity(count);
        let mut fallbacks = 0usize;
        {
            let mut pool = self.world.resource_mut::<RngPool>();
            let rng = pool.root_mut();
            for _ in 0..count {
                let sampled = (0..config.max_spawn_attempts)
                    .map(|_| boundary.sample_in_bounds(&mut *rng, config.resting_height))
                    .find(|p| boundary.contains(*p));
                positions.push(sampled.unwrap_or_else(|| {
                    fallbacks += 1;
                    let p = boundary.interior_point();
                    Vec3::new(p.x, config.resting_height, p.z)
                }));
            }
        }
        if fallbacks > 0 {
            warn!(fallbacks, "spawn sampling exhausted, placed agents at the venue interior point");
        }
        self.spawn_agents_now(positions);
    }

    fn spawn_agents_now(&mut self, positions: Vec<Vec3>) {
        let speeds = self.world.resource::<SimConfig>().speeds;
        let first_id = self.next_agent_id;
        let mut bundles = Vec::with_capacity(positions.len());
        {
            let mut pool = self.world.resource_mut::<RngPool>();
            let rng = pool.root_mut();
            for position in positions {
                bundles.push(AgentBundle::new(self.next_agent_id, position, draw_speed(&mut *rng, &speeds)));
                self.next_agent_id += 1;
            }
        }
        let count = bundles.len();
        self.world.spawn_batch(bundles);
        info!(count, first_id, "agents spawned");
    }

    // ========================================================================
    // STEPPING
    // ========================================================================

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed updates
    /// as needed. This keeps behaviour independent of the host frame rate.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.fixed_timestep();

        self.time_accumulator += dt;
        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run exactly one fixed update.
    pub fn tick(&mut self) {
        let fixed_dt = self.fixed_timestep();
        self.fixed_update(fixed_dt);
    }

    fn fixed_timestep(&self) -> f32 {
        self.world
            .get_resource::<SimConfig>()
            .map(|c| c.fixed_timestep)
            .unwrap_or(1.0 / 30.0)
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        // Structural changes only happen here, between ticks.
        self.apply_commands();

        if let Some(mut dt_res) = self.world.get_resource_mut::<DeltaTime>() {
            dt_res.0 = dt;
        }
        if let Some(mut tick_res) = self.world.get_resource_mut::<SimTick>() {
            tick_res.increment();
        }
        if let Some(mut pool) = self.world.get_resource_mut::<RngPool>() {
            pool.reseed_lanes();
        }
        if let Some(mut stats) = self.world.get_resource_mut::<TickStats>() {
            stats.begin_tick();
        }

        self.schedule.run(&mut self.world);

        self.tick += 1;
        self.time += dt;
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        let panic_active = self.panic_active();
        Snapshot::from_world(&mut self.world, self.tick, self.time, panic_active)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Id, position and status of every agent, ordered by id.
    pub fn agent_snapshot(&mut self) -> Vec<AgentSnapshot> {
        agent_snapshots(&mut self.world)
    }

    /// Position and load of every exit, ordered by id.
    pub fn exit_stats(&mut self) -> Vec<ExitSnapshot> {
        exit_snapshots(&mut self.world)
    }

    pub fn status_counts(&mut self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        let mut query = self.world.query::<&AgentState>();
        for state in query.iter(&self.world) {
            counts.add(state.status);
        }
        counts
    }

    pub fn agent_count(&mut self) -> usize {
        let mut query = self.world.query::<&AgentId>();
        query.iter(&self.world).count()
    }

    pub fn exit_count(&mut self) -> usize {
        let mut query = self.world.query::<&ExitId>();
        query.iter(&self.world).count()
    }

    /// Decision counters for the last tick and the whole session.
    pub fn tick_stats(&self) -> TickStats {
        self.world.get_resource::<TickStats>().copied().unwrap_or_default()
    }

    pub fn panic_active(&self) -> bool {
        self.world
            .get_resource::<PanicState>()
            .map(|p| p.active)
            .unwrap_or(false)
    }

    /// Get the current venue footprint.
    pub fn boundary(&self) -> Option<&AreaBoundary> {
        self.world.get_resource::<AreaBoundary>()
    }

    pub fn config(&self) -> Option<&SimConfig> {
        self.world.get_resource::<SimConfig>()
    }

    /// The active configuration as JSON, loadable with `SimWorld::from_json_config`.
    pub fn config_json(&self) -> Result<String, SimError> {
        match self.config() {
            Some(config) => config_to_json(config),
            None => Err(SimError::InvalidConfig("world has no configuration")),
        }
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    /// Get the spatial grid reference (for debugging/visualization).
    pub fn spatial_grid(&self) -> Option<&SpatialGrid> {
        self.world.get_resource::<SpatialGrid>()
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R, range: &Range) -> f32 {
    rng.gen_range(range.min..=range.max)
}

/// Per-agent speeds for a new agent.
fn draw_speed<R: Rng + ?Sized>(rng: &mut R, speeds: &SpeedRanges) -> MoveSpeed {
    MoveSpeed {
        move_speed: draw(rng, &speeds.move_speed),
        run_speed: draw(rng, &speeds.run_speed),
        jump_speed: draw(rng, &speeds.jump_speed),
        panic_jump_speed: draw(rng, &speeds.panic_jump_speed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoundaryCorners;

    #[test]
    fn test_new_world() {
        let sim = SimWorld::new();
        assert_eq!(sim.current_tick(), 0);
        assert!(!sim.panic_active());
    }

    #[test]
    fn test_step_advances_tick() {
        let mut sim = SimWorld::new();
        sim.step(0.04);
        assert_eq!(sim.current_tick(), 1);
        sim.step(0.04);
        assert_eq!(sim.current_tick(), 2);
        sim.step(0.01);
        assert_eq!(sim.current_tick(), 2);
        sim.tick();
        assert_eq!(sim.current_tick(), 3);
    }

    #[test]
    fn test_commands_wait_for_next_tick() {
        let mut sim = SimWorld::new();
        sim.spawn_agents(25);
        sim.place_exit(Vec3::new(0.0, 0.5, 25.0));
        assert_eq!(sim.agent_count(), 0);
        assert_eq!(sim.pending_commands(), 2);

        sim.tick();
        assert_eq!(sim.agent_count(), 25);
        assert_eq!(sim.exit_count(), 1);
        assert_eq!(sim.pending_commands(), 0);
    }

    #[test]
    fn test_spawned_agents_inside_and_unique() {
        let mut sim = SimWorld::new();
        sim.spawn_agents(200);
        sim.tick();

        let boundary = sim.boundary().unwrap().clone();
        let agents = sim.agent_snapshot();
        assert_eq!(agents.len(), 200);
        for (i, agent) in agents.iter().enumerate() {
            assert_eq!(agent.id, i as u32);
            assert!(boundary.contains(Vec3::new(agent.x, 0.0, agent.z)));
        }
    }

    #[test]
    fn test_spawn_speeds_within_ranges() {
        let mut sim = SimWorld::new();
        sim.spawn_agents(50);
        sim.tick();
        let speeds = SpeedRanges::default();
        let mut query = sim.world_mut().query::<&MoveSpeed>();
        for speed in query.iter(sim.world()) {
            assert!(speed.move_speed >= speeds.move_speed.min && speed.move_speed <= speeds.move_speed.max);
            assert!(speed.run_speed >= speeds.run_speed.min && speed.run_speed <= speeds.run_speed.max);
        }
    }

    #[test]
    fn test_invalid_boundary_rejected_immediately() {
        let mut sim = SimWorld::new();
        let p = Vec3::new(1.0, 0.0, 1.0);
        let err = sim.update_boundary(p, p, p, p).unwrap_err();
        assert!(matches!(err, SimError::InvalidBoundary(_)));
        assert_eq!(sim.pending_commands(), 0);
    }

    #[test]
    fn test_boundary_wider_than_grid_row_rejected() {
        let mut sim = SimWorld::new();
        let err = sim
            .update_boundary(
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(2000.0, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 10.0),
                Vec3::new(2000.0, 0.0, 10.0),
            )
            .unwrap_err();
        assert!(matches!(err, SimError::GridKeysCollide { y_multiplier: 1000, .. }));
        assert_eq!(sim.pending_commands(), 0);
    }

    #[test]
    fn test_update_boundary_applies_next_tick() {
        let mut sim = SimWorld::new();
        sim.update_boundary(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 10.0),
        )
        .unwrap();
        assert!(sim.boundary().unwrap().contains(Vec3::new(30.0, 0.0, 30.0)));
        sim.tick();
        assert!(!sim.boundary().unwrap().contains(Vec3::new(30.0, 0.0, 30.0)));
        assert_eq!(sim.boundary().unwrap().corners().front_right.x, 10.0);
    }

    #[test]
    fn test_with_config_rejects_bad_boundary() {
        let p = Vec3::new(1.0, 0.0, 1.0);
        let config = SimConfig {
            initial_boundary: BoundaryCorners {
                front_left: p,
                front_right: p,
                back_left: p,
                back_right: p,
            },
            ..Default::default()
        };
        assert!(SimWorld::with_config(config).is_err());
    }

    #[test]
    fn test_clear_agents_and_exits() {
        let mut sim = SimWorld::new();
        sim.spawn_agents(10);
        sim.place_exit(Vec3::new(0.0, 0.5, 25.0));
        sim.place_exit(Vec3::new(50.0, 0.5, 25.0));
        sim.tick();
        sim.clear_agents();
        sim.clear_exits();
        sim.tick();
        assert_eq!(sim.agent_count(), 0);
        assert_eq!(sim.exit_count(), 0);

        // Ids keep counting up after a clear.
        sim.spawn_agents(1);
        sim.tick();
        assert_eq!(sim.agent_snapshot()[0].id, 10);
    }

    #[test]
    fn test_snapshot_json() {
        let mut sim = SimWorld::new();
        sim.spawn_agents(3);
        sim.place_exit(Vec3::new(0.0, 0.5, 25.0));
        sim.tick();
        let json = sim.snapshot_json();
        assert!(json.contains("agents"));
        assert!(json.contains("exits"));
        assert!(json.contains("nearby_count"));
    }

    #[test]
    fn test_spatial_grid_populated() {
        let mut sim = SimWorld::new();
        sim.spawn_agents(50);
        sim.place_exit(Vec3::new(0.0, 0.5, 25.0));
        sim.tick();
        assert_eq!(sim.spatial_grid().unwrap().total_count(), 51);
    }

    #[test]
    fn test_panic_reaches_agents_same_tick() {
        let mut sim = SimWorld::new();
        sim.spawn_agents(30);
        sim.place_exit(Vec3::new(0.0, 0.5, 25.0));
        sim.tick();
        sim.trigger_panic(Vec3::new(25.0, 0.5, 25.0), 100.0);
        sim.tick();
        let counts = sim.status_counts();
        assert_eq!(counts.running, 30);
        assert!(sim.panic_active());
        assert_eq!(sim.tick_stats().last.panicked, 30);
    }

    #[test]
    fn test_default_panic_radius() {
        let mut sim = SimWorld::new();
        let radius = sim.config().unwrap().panic_radius;
        sim.spawn_agents_at(vec![
            Vec3::new(20.0, 0.5, 20.0),
            Vec3::new(20.0 + radius * 0.5, 0.5, 20.0),
            Vec3::new(20.0 + radius * 2.0, 0.5, 20.0),
        ]);
        sim.tick();
        sim.trigger_panic_default(Vec3::new(20.0, 0.5, 20.0));
        sim.tick();
        assert_eq!(sim.status_counts().running, 2);
    }

    #[test]
    fn test_config_json_rebuilds_same_world() {
        let config = SimConfig {
            seed: 31,
            overload_threshold: 4,
            ..Default::default()
        };
        let sim = SimWorld::with_config(config.clone()).unwrap();
        let json = sim.config_json().unwrap();
        let rebuilt = SimWorld::from_json_config(&json).unwrap();
        assert_eq!(rebuilt.config(), Some(&config));
    }

    #[test]
    fn test_stress_2000_agents() {
        use std::time::Instant;

        let mut sim = SimWorld::new();
        sim.spawn_agents(2000);
        sim.place_exit(Vec3::new(0.0, 0.5, 25.0));
        sim.place_exit(Vec3::new(50.0, 0.5, 25.0));

        let start = Instant::now();
        for _ in 0..60 {
            sim.tick();
        }
        sim.trigger_panic(Vec3::new(25.0, 0.5, 25.0), 15.0);
        for _ in 0..60 {
            sim.tick();
        }
        let elapsed = start.elapsed();

        let ticks = sim.current_tick();
        println!("2000 agents, {} ticks in {:?} ({:.2} ms/tick)", ticks, elapsed, elapsed.as_millis() as f64 / ticks as f64);
        assert_eq!(sim.agent_count(), 2000);
        assert!(elapsed.as_secs() < 60, "Simulation too slow: {:?}", elapsed);
    }
}
