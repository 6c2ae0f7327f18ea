// Swarm-wide and spawner settings.
// Defaults reproduce the tuning the flock was designed around.

use glam::Vec3;

use super::components::{Boid, Weights};
use super::error::{FlockError, FlockResult};

/// Settings shared by every agent in one simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct SwarmConfig {
    /// How far agents perceive each other. Also the grid cell size.
    pub max_vision_distance: f32,
    /// Maximum neighbours returned per query (the querying agent included).
    pub max_neighbors: usize,
    pub weights: Weights,
    pub turn_speed: f32,
    pub move_speed: f32,
    pub seed: u64,
    /// Advance positions by velocity each tick. Disable when an external
    /// physics step owns positions and reports them via `set_position`.
    pub integrate_positions: bool,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_vision_distance: 60.0,
            max_neighbors: 20,
            weights: Weights::default(),
            turn_speed: 1.0,
            move_speed: 5.0,
            seed: 0,
            integrate_positions: true,
        }
    }
}

impl SwarmConfig {
    pub fn validate(&self) -> FlockResult<()> {
        if self.max_neighbors == 0 {
            return Err(FlockError::InvalidConfig("max_neighbors must be at least 1"));
        }
        self.boid().validate()
    }

    /// Per-agent parameters an agent gets when it joins this swarm.
    pub fn boid(&self) -> Boid {
        Boid {
            max_vision_distance: self.max_vision_distance,
            turn_speed: self.turn_speed,
            move_speed: self.move_speed,
            weights: self.weights,
        }
    }

    pub fn spawn(&self, position: Vec3, forward: Vec3) -> AgentSpawn {
        AgentSpawn {
            position,
            forward,
            boid: self.boid(),
        }
    }
}

/// Everything needed to register one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSpawn {
    pub position: Vec3,
    /// Normalized on registration; zero faces +Z.
    pub forward: Vec3,
    pub boid: Boid,
}

/// Where and how many agents the spawner creates.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnerConfig {
    /// Centre of the spawn cube.
    pub origin: Vec3,
    pub count: usize,
    /// Side length of the spawn cube.
    pub range: f32,
    /// Re-roll positions that overlap scenery.
    pub avoid_scene_intersection: bool,
    pub avoidance_attempts: u32,
    pub avoidance_radius: f32,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            count: 200,
            range: 50.0,
            avoid_scene_intersection: false,
            avoidance_attempts: 4,
            avoidance_radius: 1.0,
        }
    }
}

impl SpawnerConfig {
    pub fn validate(&self) -> FlockResult<()> {
        if !self.range.is_finite() || self.range < 0.0 {
            return Err(FlockError::InvalidConfig("spawn range must be finite and non-negative"));
        }
        if !self.origin.is_finite() {
            return Err(FlockError::InvalidConfig("spawn origin must be finite"));
        }
        if !self.avoidance_radius.is_finite() || self.avoidance_radius < 0.0 {
            return Err(FlockError::InvalidConfig("avoidance radius must be finite and non-negative"));
        }
        Ok(())
    }
}
