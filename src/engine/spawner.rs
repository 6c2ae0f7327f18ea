// Populates a simulation with agents scattered through a cube.

use bevy_ecs::entity::Entity;
use glam::{Quat, Vec3};
use log::{debug, warn};
use rand::Rng;

use super::config::{SpawnerConfig, SwarmConfig};
use super::error::FlockResult;
use super::obstacles::OverlapOracle;
use super::simulation::Simulation;

/// One planned spawn: where, and facing which way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Vec3,
    pub forward: Vec3,
}

pub struct Spawner {
    pub config: SpawnerConfig,
}

impl Spawner {
    pub fn new(config: SpawnerConfig) -> FlockResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Random position in the spawn cube plus a uniformly random facing.
    ///
    /// With `avoid_scene_intersection`, a position overlapping scenery is
    /// re-rolled up to `avoidance_attempts` times; the last roll is kept
    /// even if it still overlaps.
    pub fn place<O, R>(&self, overlap: &O, rng: &mut R) -> Placement
    where
        O: OverlapOracle + ?Sized,
        R: Rng,
    {
        let cfg = &self.config;
        let mut position = cfg.origin + random_in_cube(rng, cfg.range);

        if cfg.avoid_scene_intersection {
            let mut attempt = 0;
            while attempt < cfg.avoidance_attempts
                && overlap.overlaps_sphere(position, cfg.avoidance_radius)
            {
                position = cfg.origin + random_in_cube(rng, cfg.range);
                attempt += 1;
            }
            if attempt == cfg.avoidance_attempts && overlap.overlaps_sphere(position, cfg.avoidance_radius) {
                warn!("spawn at {position} still overlaps scenery after {attempt} attempts");
            }
        }

        Placement {
            position,
            forward: random_rotation(rng) * Vec3::Z,
        }
    }

    pub fn placements<O, R>(&self, overlap: &O, rng: &mut R) -> Vec<Placement>
    where
        O: OverlapOracle + ?Sized,
        R: Rng,
    {
        (0..self.config.count).map(|_| self.place(overlap, rng)).collect()
    }

    /// Register `count` agents with the swarm's default parameters, drawing
    /// randomness from the simulation's own RNG.
    pub fn populate<O>(&self, sim: &mut Simulation, overlap: &O) -> FlockResult<Vec<Entity>>
    where
        O: OverlapOracle + ?Sized,
    {
        let placements = self.placements(overlap, sim.rng());
        let swarm: SwarmConfig = sim.config().clone();
        let ids = placements
            .into_iter()
            .map(|p| sim.register(swarm.spawn(p.position, p.forward)))
            .collect::<FlockResult<Vec<_>>>()?;
        debug!("spawned {} agents around {}", ids.len(), self.config.origin);
        Ok(ids)
    }
}

/// Uniform point in an axis-aligned cube of side `range` centred on the origin.
fn random_in_cube<R: Rng>(rng: &mut R, range: f32) -> Vec3 {
    Vec3::new(
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
        rng.gen_range(-1.0..1.0),
    ) * range
        / 2.0
}

/// Uniformly distributed rotation (Shoemake's method).
fn random_rotation<R: Rng>(rng: &mut R) -> Quat {
    let u1: f32 = rng.gen_range(0.0..1.0);
    let u2: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    let u3: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    Quat::from_xyzw(a * u2.sin(), a * u2.cos(), b * u3.sin(), b * u3.cos()).normalize()
}
