//! Exit congestion - counts agents around each exit and flags overloaded ones.

use crate::components::*;
use crate::config::SimConfig;
use crate::spatial::SpatialGrid;
use bevy_ecs::prelude::*;

/// Read-only view of an exit used for routing decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitInfo {
    pub id: ExitId,
    pub position: Vec3,
    pub overloaded: bool,
}

/// Collect every exit, ordered by id so ties always resolve the same way.
pub fn collect_exits<'a>(
    exits: impl Iterator<Item = (&'a ExitId, &'a Position, &'a ExitStatus)>,
) -> Vec<ExitInfo> {
    let mut out: Vec<ExitInfo> = exits
        .map(|(id, pos, status)| ExitInfo {
            id: *id,
            position: pos.0,
            overloaded: status.overloaded,
        })
        .collect();
    out.sort_by_key(|e| e.id);
    out
}

/// System that refreshes `ExitStatus` from the spatial grid.
///
/// Only agents are counted; an exit never adds to its own load.
pub fn congestion_system(
    config: Res<SimConfig>,
    grid: Res<SpatialGrid>,
    mut exits: Query<(&Position, &mut ExitStatus), With<ExitId>>,
) {
    for (pos, mut status) in exits.iter_mut() {
        let nearby = grid.count_near_of(pos.0, 1, EntityKind::Agent);
        status.nearby_count = nearby;
        status.overloaded = nearby > config.overload_threshold;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::spatial_grid_update_system;

    fn run_with_agents(count: usize) -> ExitStatus {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(SpatialGrid::default());

        let exit = world.spawn(ExitBundle::new(0, Vec3::new(10.5, 0.5, 10.5))).id();
        for i in 0..count {
            // Spread over the 3 x 3 cells around the exit.
            let dx = (i % 3) as f32 - 1.0;
            let dz = ((i / 3) % 3) as f32 - 1.0;
            world.spawn(AgentBundle::new(
                i as u32,
                Vec3::new(10.5 + dx, 0.5, 10.5 + dz),
                MoveSpeed::default(),
            ));
        }
        // One agent two cells away never counts.
        world.spawn(AgentBundle::new(999, Vec3::new(12.5, 0.5, 10.5), MoveSpeed::default()));

        let mut schedule = Schedule::default();
        schedule.add_systems((spatial_grid_update_system, congestion_system).chain());
        schedule.run(&mut world);

        *world.get::<ExitStatus>(exit).unwrap()
    }

    #[test]
    fn test_ten_agents_not_overloaded() {
        let status = run_with_agents(10);
        assert_eq!(status.nearby_count, 10);
        assert!(!status.overloaded);
    }

    #[test]
    fn test_eleven_agents_overloaded() {
        let status = run_with_agents(11);
        assert_eq!(status.nearby_count, 11);
        assert!(status.overloaded);
    }

    #[test]
    fn test_collect_exits_sorted_by_id() {
        let a = (ExitId(3), Position::new(0.0, 0.0, 0.0), ExitStatus::default());
        let b = (ExitId(1), Position::new(1.0, 0.0, 0.0), ExitStatus::default());
        let exits = collect_exits([(&a.0, &a.1, &a.2), (&b.0, &b.1, &b.2)].into_iter());
        assert_eq!(exits[0].id, ExitId(1));
        assert_eq!(exits[1].id, ExitId(3));
    }
}
