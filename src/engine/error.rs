// Errors reported by the flocking engine.
// Every variant is fatal to the operation that raised it, never to the simulation.

use bevy_ecs::entity::Entity;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlockError {
    /// The id is not registered (never was, or was already removed).
    #[error("agent {0:?} is not registered")]
    UnknownAgent(Entity),
    #[error("max vision distance must be finite and positive, got {0}")]
    InvalidVisionDistance(f32),
    /// The 3x3x3 neighbourhood scan only covers agents whose vision fits in one cell.
    #[error("vision distance {vision} exceeds the grid cell size {cell_size}")]
    VisionExceedsCellSize { vision: f32, cell_size: f32 },
    #[error("turn speed must be finite and positive, got {0}")]
    InvalidTurnSpeed(f32),
    #[error("move speed must be finite and non-negative, got {0}")]
    InvalidMoveSpeed(f32),
    #[error("expected {expected} steering weights, got {actual}")]
    WeightCount { expected: usize, actual: usize },
    #[error("grid cell size must be finite and positive, got {0}")]
    InvalidCellSize(f32),
    #[error("delta time must be finite and non-negative, got {0}")]
    InvalidDeltaTime(f32),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

pub type FlockResult<T> = Result<T, FlockError>;
