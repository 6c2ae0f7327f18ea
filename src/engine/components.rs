// Core ECS components for a boid.
// The World owns these; the Entity id doubles as the agent's stable id.

use bevy_ecs::prelude::*;
use glam::Vec3;

use super::error::{FlockError, FlockResult};

/// Position and facing of an agent in 3D space.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Unit-length facing direction.
    pub forward: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::Z,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Build a transform facing `forward`. A zero or non-finite forward faces +Z.
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self {
            position,
            forward: forward.try_normalize().unwrap_or(Vec3::Z),
        }
    }
}

/// Velocity of an entity in 3D space (units per second)
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct Velocity {
    pub linear: Vec3,
}

impl Velocity {
    pub fn new(linear: Vec3) -> Self {
        Self { linear }
    }
}

/// Strengths of the five steering behaviours, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub alignment: f32,
    pub cohesion: f32,
    pub separation: f32,
    pub seek: f32,
    pub avoidance: f32,
}

impl Weights {
    pub const COUNT: usize = 5;

    pub const fn new(alignment: f32, cohesion: f32, separation: f32, seek: f32, avoidance: f32) -> Self {
        Self {
            alignment,
            cohesion,
            separation,
            seek,
            avoidance,
        }
    }

    /// Ordered as alignment, cohesion, separation, seek, avoidance.
    pub fn from_slice(values: &[f32]) -> FlockResult<Self> {
        match *values {
            [alignment, cohesion, separation, seek, avoidance] => {
                Ok(Self::new(alignment, cohesion, separation, seek, avoidance))
            }
            _ => Err(FlockError::WeightCount {
                expected: Self::COUNT,
                actual: values.len(),
            }),
        }
    }

    pub fn to_array(self) -> [f32; Self::COUNT] {
        [self.alignment, self.cohesion, self.separation, self.seek, self.avoidance]
    }

    fn is_finite(&self) -> bool {
        self.to_array().iter().all(|w| w.is_finite())
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self::new(1.4, 0.5, 0.75, 0.2, 10.0)
    }
}

impl TryFrom<&[f32]> for Weights {
    type Error = FlockError;

    fn try_from(values: &[f32]) -> FlockResult<Self> {
        Self::from_slice(values)
    }
}

/// Per-agent tunables.
///
/// `max_vision_distance`: perception radius; the avoidance raycast reaches half of it.
/// `turn_speed`:          slerp rate toward the desired heading, per second.
/// `move_speed`:          cruising speed in world units/sec.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Boid {
    pub max_vision_distance: f32,
    pub turn_speed: f32,
    pub move_speed: f32,
    pub weights: Weights,
}

impl Default for Boid {
    fn default() -> Self {
        Self {
            max_vision_distance: 60.0,
            turn_speed: 1.0,
            move_speed: 5.0,
            weights: Weights::default(),
        }
    }
}

impl Boid {
    /// Reject parameters that would produce NaNs while ticking.
    pub fn validate(&self) -> FlockResult<()> {
        let vision = self.max_vision_distance;
        if !vision.is_finite() || vision <= 0.0 {
            return Err(FlockError::InvalidVisionDistance(vision));
        }
        if !self.turn_speed.is_finite() || self.turn_speed <= 0.0 {
            return Err(FlockError::InvalidTurnSpeed(self.turn_speed));
        }
        if !self.move_speed.is_finite() || self.move_speed < 0.0 {
            return Err(FlockError::InvalidMoveSpeed(self.move_speed));
        }
        if !self.weights.is_finite() {
            return Err(FlockError::InvalidConfig("steering weights must be finite"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_require_exactly_five_values() {
        let weights = Weights::from_slice(&[1.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(weights.alignment, 1.0);
        assert_eq!(weights.to_array(), [1.0, 0.0, 0.0, 0.0, 0.0]);

        assert_eq!(
            Weights::from_slice(&[1.0, 2.0]),
            Err(FlockError::WeightCount { expected: 5, actual: 2 })
        );
        assert!(Weights::try_from(&[0.0; 6][..]).is_err());
    }

    #[test]
    fn boid_validation_rejects_degenerate_parameters() {
        assert!(Boid::default().validate().is_ok());

        let zero_vision = Boid { max_vision_distance: 0.0, ..Default::default() };
        assert_eq!(zero_vision.validate(), Err(FlockError::InvalidVisionDistance(0.0)));

        let nan_turn = Boid { turn_speed: f32::NAN, ..Default::default() };
        assert!(matches!(nan_turn.validate(), Err(FlockError::InvalidTurnSpeed(_))));

        let reverse = Boid { move_speed: -1.0, ..Default::default() };
        assert_eq!(reverse.validate(), Err(FlockError::InvalidMoveSpeed(-1.0)));

        let stationary = Boid { move_speed: 0.0, ..Default::default() };
        assert!(stationary.validate().is_ok());
    }

    #[test]
    fn transform_normalizes_forward() {
        let t = Transform::new(Vec3::ONE, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(t.forward, Vec3::Y);
        assert_eq!(Transform::new(Vec3::ZERO, Vec3::ZERO).forward, Vec3::Z);
    }
}
