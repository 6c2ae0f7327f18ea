// Engine module - spatial hashing and boid steering for flock simulation

pub mod components;
pub mod config;
pub mod debug;
pub mod error;
pub mod obstacles;
pub mod simulation;
pub mod spatial;
pub mod spawner;
pub mod steering;
pub mod systems;

// Re-export commonly used items
pub use components::*;
pub use config::{AgentSpawn, SpawnerConfig, SwarmConfig};
pub use debug::{CellDebugDraw, TickStats, grid_cells};
pub use error::{FlockError, FlockResult};
pub use obstacles::{NoObstacles, ObstacleOracle, OverlapOracle, Sphere, SphereField};
pub use simulation::{AgentView, Simulation, TargetProvider};
pub use spatial::SpatialHashGrid;
pub use spawner::{Placement, Spawner};
pub use steering::{AgentSnapshot, NeighborState, compute_direction};
