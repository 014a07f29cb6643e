//! ECS Systems for the crowd simulation.
//!
//! Systems contain the crowd logic that operates on components.
//!
//! ## Tick Order
//!
//! One fixed tick runs these systems chained, in this order:
//!
//! 1. `spatial_grid_update_system` - rebuilds the spatial grid from agents and exits
//! 2. `congestion_system` - refreshes exit load and overload flags
//! 3. `exit_reroute_system` - running agents may turn away from crowded exits
//! 4. `behavior_roll_system` - idle/dance/move roll for agents without a target
//! 5. `target_generation_system` - wander targets for agents that started moving
//! 6. `movement_system` - walking, running, bobbing, settling
//! 7. `panic_broadcast_system` - applies queued panic triggers
//! 8. `panic_settle_system` - clears the panic flag once nobody runs
//! 9. `tick_summary_system` - debug log line
//!
//! Per-agent passes that draw random numbers work on copies sorted by agent id and split
//! across the `RngPool` lanes; they only ever read the previous step's shared state.

pub mod behavior;
pub mod congestion;
pub mod movement;
pub mod panic;
pub mod serialization;
pub mod tick;

pub use behavior::*;
pub use congestion::*;
pub use movement::*;
pub use panic::*;
pub use serialization::*;
pub use tick::*;
