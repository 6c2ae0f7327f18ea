// Headless flock demo: spawns a swarm around a few spherical obstacles,
// steers it toward a goal and logs progress.
//
// Overrides (environment):
//   FLOCK_AGENTS  number of agents     (default 200)
//   FLOCK_TICKS   fixed steps to run    (default 500)
//   FLOCK_SEED    RNG seed              (default 0)
// Set RUST_LOG=info (or debug/trace) to see output.

use std::str::FromStr;

use glam::Vec3;
use log::{error, info, warn};

use flume_flock::engine::{
    FlockResult, Simulation, SpawnerConfig, Spawner, SphereField, SwarmConfig, grid_cells,
};

const FIXED_DELTA_TIME: f32 = 1.0 / 50.0;
const REPORT_EVERY: u64 = 50;

fn env_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("ignoring {key}={raw:?}: not a valid value, using {default}");
            default
        }),
        Err(_) => default,
    }
}

fn run() -> FlockResult<()> {
    let agents: usize = env_or("FLOCK_AGENTS", 200);
    let ticks: u64 = env_or("FLOCK_TICKS", 500);
    let seed: u64 = env_or("FLOCK_SEED", 0);

    let scenery = SphereField::default()
        .with_sphere(Vec3::new(0.0, 0.0, 60.0), 12.0)
        .with_sphere(Vec3::new(30.0, 10.0, 120.0), 8.0)
        .with_sphere(Vec3::new(-25.0, -5.0, 90.0), 10.0);

    let swarm = SwarmConfig { seed, ..Default::default() };
    let mut sim = Simulation::new(swarm, scenery.clone())?;
    sim.set_target(Some(Vec3::new(0.0, 0.0, 200.0)));

    let spawner = Spawner::new(SpawnerConfig {
        count: agents,
        avoid_scene_intersection: true,
        ..Default::default()
    })?;
    spawner.populate(&mut sim, &scenery)?;
    info!("spawned {} agents, {} occupied cells", sim.len(), grid_cells(sim.grid()).len());

    for _ in 0..ticks {
        let stats = sim.tick(FIXED_DELTA_TIME)?;
        if stats.tick % REPORT_EVERY == 0 {
            let views = sim.agents();
            let centroid = views.iter().map(|a| a.position).sum::<Vec3>() / views.len().max(1) as f32;
            info!(
                "tick {:>5} | agents {} | mean neighbours {:.2} | relocated {} | centroid {:.1}",
                stats.tick,
                stats.agents,
                stats.mean_neighbors(),
                stats.relocated,
                centroid,
            );
        }
    }

    info!("done after {} ticks, {} occupied cells", sim.ticks(), grid_cells(sim.grid()).len());
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        error!("simulation failed: {e}");
        std::process::exit(1);
    }
}
