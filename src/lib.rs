// Flock simulation: spatial hash grid neighbour queries + boid steering.

pub mod engine;

pub use engine::*;
