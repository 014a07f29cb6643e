//! Festival crowd demo: a calm crowd, a panic, and the rush to the exits.
//!
//! Run with: cargo run --example panic_demo
//! More detail: RUST_LOG=crowd_sim=debug cargo run --example panic_demo

use crowd_sim::{AgentStatus, SimWorld, Vec3};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crowd_sim=info")),
        )
        .init();

    println!("=== Crowd Panic Simulation - Demo ===\n");

    let mut sim = SimWorld::new();
    sim.spawn_agents(400);
    sim.place_exit(Vec3::new(0.0, 0.5, 25.0));
    sim.place_exit(Vec3::new(50.0, 0.5, 25.0));
    sim.place_exit(Vec3::new(25.0, 0.5, 50.0));

    // 10 seconds of festival at 30 Hz, rendered at 60 fps.
    println!("Running the calm crowd for 10 seconds...\n");
    for frame in 0..600 {
        sim.step(1.0 / 60.0);
        if (frame + 1) % 120 == 0 {
            print_state(&mut sim);
        }
    }

    println!("\n--- Panic at the stage (25, 40) ---\n");
    sim.trigger_panic(Vec3::new(25.0, 0.5, 40.0), 20.0);

    for frame in 0..1200 {
        sim.step(1.0 / 60.0);
        if (frame + 1) % 120 == 0 {
            print_state(&mut sim);
            print_exits(&mut sim);
        }
    }

    let stats = sim.tick_stats();
    println!("\n=== Session totals ===");
    println!(
        "  rolls: idle={} dance={} move={}",
        stats.total.idle_rolls, stats.total.dance_rolls, stats.total.move_rolls
    );
    println!(
        "  targets={} fallbacks={} reroutes={} panicked={} exits reached={}",
        stats.total.targets_generated,
        stats.total.target_fallbacks,
        stats.total.reroutes,
        stats.total.panicked,
        stats.total.exits_reached
    );
}

fn print_state(sim: &mut SimWorld) {
    let counts = sim.status_counts();
    let line: Vec<String> = AgentStatus::ALL
        .iter()
        .map(|s| format!("{}={:3}", s.as_str().to_lowercase(), counts.get(*s)))
        .collect();
    println!(
        "Tick {:5} (t={:5.1}s) {} panic={}",
        sim.current_tick(),
        sim.current_time(),
        line.join(" "),
        sim.panic_active()
    );
}

fn print_exits(sim: &mut SimWorld) {
    for exit in sim.exit_stats() {
        println!(
            "    exit {} at ({:.0}, {:.0}): {:3} nearby{}",
            exit.id,
            exit.x,
            exit.z,
            exit.nearby_count,
            if exit.overloaded { " OVERLOADED" } else { "" }
        );
    }
}
