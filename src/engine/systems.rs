// Per-tick state updates applied after steering has decided where to go.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};

use super::components::*;

/// Rotate unit vector `from` toward unit vector `to` by fraction `t` of the arc.
/// `t` is clamped to [0, 1].
pub fn slerp_direction(from: Vec3, to: Vec3, t: f32) -> Vec3 {
    let t = t.clamp(0.0, 1.0);
    let arc = Quat::from_rotation_arc(from, to);
    (Quat::IDENTITY.slerp(arc, t) * from).normalize_or_zero()
}

/// Turn toward `desired` at `turn_speed` and set velocity along the new facing.
///
/// Forward stays unit length; velocity is `forward * move_speed`.
pub fn steer(transform: &mut Transform, velocity: &mut Velocity, boid: &Boid, desired: Vec3, delta_time: f32) {
    let smoothed = slerp_direction(transform.forward, desired, boid.turn_speed * delta_time);
    let heading = smoothed.try_normalize().unwrap_or(transform.forward);
    velocity.linear = heading * boid.move_speed;
    transform.forward = heading;
}

/// Advance every agent by `velocity * delta_time`.
///
/// Only runs when the simulation owns integration; external physics skips it.
pub fn movement_system(world: &mut World, delta_time: f32) {
    let mut query = world.query::<(&mut Transform, &Velocity)>();
    for (mut transform, velocity) in query.iter_mut(world) {
        transform.position += velocity.linear * delta_time;
    }
}
