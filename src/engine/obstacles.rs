// Scenery queries the engine depends on but does not own.
// A physics engine normally answers these; SphereField is a minimal stand-in.

use glam::Vec3;

/// Answers "is anything in the way?" for the avoidance behaviour.
pub trait ObstacleOracle {
    /// True if a ray from `origin` along `direction` hits scenery within `max_distance`.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> bool;
}

/// Answers "is this spot free?" for spawn placement.
pub trait OverlapOracle {
    fn overlaps_sphere(&self, center: Vec3, radius: f32) -> bool;
}

/// Empty scenery.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObstacles;

impl ObstacleOracle for NoObstacles {
    fn raycast(&self, _origin: Vec3, _direction: Vec3, _max_distance: f32) -> bool {
        false
    }
}

impl OverlapOracle for NoObstacles {
    fn overlaps_sphere(&self, _center: Vec3, _radius: f32) -> bool {
        false
    }
}

impl<F> ObstacleOracle for F
where
    F: Fn(Vec3, Vec3, f32) -> bool,
{
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> bool {
        self(origin, direction, max_distance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Static spherical obstacles.
#[derive(Debug, Clone, Default)]
pub struct SphereField {
    pub spheres: Vec<Sphere>,
}

impl SphereField {
    pub fn new(spheres: Vec<Sphere>) -> Self {
        Self { spheres }
    }

    pub fn with_sphere(mut self, center: Vec3, radius: f32) -> Self {
        self.spheres.push(Sphere { center, radius });
        self
    }
}

impl ObstacleOracle for SphereField {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> bool {
        let Some(dir) = direction.try_normalize() else {
            return false;
        };
        self.spheres
            .iter()
            .any(|s| ray_hits_sphere(origin, dir, max_distance, s))
    }
}

impl OverlapOracle for SphereField {
    fn overlaps_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.spheres.iter().any(|s| {
            let reach = s.radius + radius;
            s.center.distance_squared(center) <= reach * reach
        })
    }
}

/// `dir` must be unit length.
fn ray_hits_sphere(origin: Vec3, dir: Vec3, max_distance: f32, sphere: &Sphere) -> bool {
    let to_center = sphere.center - origin;
    let r_sq = sphere.radius * sphere.radius;
    if to_center.length_squared() <= r_sq {
        // Starting inside counts as a hit.
        return true;
    }
    let along = to_center.dot(dir);
    if along < 0.0 {
        return false;
    }
    let perp_sq = to_center.length_squared() - along * along;
    if perp_sq > r_sq {
        return false;
    }
    let entry = along - (r_sq - perp_sq).sqrt();
    entry <= max_distance
}
