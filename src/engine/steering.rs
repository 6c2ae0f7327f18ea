// Boid steering behaviours.
//
// Pure computation: given one agent, the neighbours the grid returned for it,
// an optional goal and the scenery oracle, produce a unit heading. Nothing in
// here touches the World or the grid.
//
// Five behaviours, blended by the agent's Weights:
//   alignment:  face the way neighbours face
//   cohesion:   move toward the neighbours' centroid
//   separation: move away from neighbours
//   seek:       move toward the goal
//   avoidance:  find an unobstructed course (zero when already clear)

use glam::{EulerRot, Quat, Vec3};
use rand::Rng;

use super::components::{Boid, Transform};
use super::obstacles::ObstacleOracle;

/// Cone widening per avoidance retry, in degrees.
pub const AVOIDANCE_CONE_STEP_DEG: f32 = 10.0;
/// Cone angle at which avoidance gives up and turns around, in degrees.
pub const AVOIDANCE_CONE_LIMIT_DEG: f32 = 180.0;
/// Upper bound on raycasts per avoidance evaluation.
pub const MAX_AVOIDANCE_CASTS: usize = (AVOIDANCE_CONE_LIMIT_DEG / AVOIDANCE_CONE_STEP_DEG) as usize;

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// Read-only state of the steering agent, collected before steering runs.
#[derive(Debug, Clone, Copy)]
pub struct AgentSnapshot {
    pub position: Vec3,
    /// Unit facing direction.
    pub forward: Vec3,
    pub boid: Boid,
}

impl AgentSnapshot {
    pub fn new(transform: &Transform, boid: &Boid) -> Self {
        Self {
            position: transform.position,
            forward: transform.forward,
            boid: *boid,
        }
    }
}

/// What an agent needs to know about one of its neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborState {
    pub position: Vec3,
    pub forward: Vec3,
}

impl From<&AgentSnapshot> for NeighborState {
    fn from(agent: &AgentSnapshot) -> Self {
        Self {
            position: agent.position,
            forward: agent.forward,
        }
    }
}

// ============================================================================
// BEHAVIOURS
// ============================================================================

/// `clamp01(distance / vision)` squared.
#[inline]
pub fn influence(agent: &AgentSnapshot, other: Vec3) -> f32 {
    let linear = (agent.position.distance(other) / agent.boid.max_vision_distance).clamp(0.0, 1.0);
    linear * linear
}

pub fn alignment(agent: &AgentSnapshot, neighbors: &[NeighborState]) -> Vec3 {
    neighbors
        .iter()
        .map(|n| n.forward.normalize_or_zero() * influence(agent, n.position))
        .sum::<Vec3>()
        .normalize_or_zero()
}

/// Direction toward the unweighted centroid of the neighbours.
pub fn cohesion(agent: &AgentSnapshot, neighbors: &[NeighborState]) -> Vec3 {
    if neighbors.is_empty() {
        return Vec3::ZERO;
    }
    let centroid = neighbors.iter().map(|n| n.position).sum::<Vec3>() / neighbors.len() as f32;
    (centroid - agent.position).normalize_or_zero()
}

pub fn separation(agent: &AgentSnapshot, neighbors: &[NeighborState]) -> Vec3 {
    neighbors
        .iter()
        .map(|n| (agent.position - n.position) * influence(agent, n.position))
        .sum::<Vec3>()
        .normalize_or_zero()
}

pub fn seek(agent: &AgentSnapshot, target: Option<Vec3>) -> Vec3 {
    match target {
        Some(goal) => (goal - agent.position).normalize_or_zero(),
        None => Vec3::ZERO,
    }
}

/// Search for a clear course within `max_vision_distance / 2`.
///
/// Returns zero if the current forward is already clear. Otherwise retries
/// along random rotations of forward inside a cone that widens by
/// `AVOIDANCE_CONE_STEP_DEG` per attempt, and returns `-forward` once the cone
/// reaches `AVOIDANCE_CONE_LIMIT_DEG`. Casts at most `MAX_AVOIDANCE_CASTS` rays.
pub fn avoidance<O, R>(agent: &AgentSnapshot, oracle: &O, rng: &mut R) -> Vec3
where
    O: ObstacleOracle + ?Sized,
    R: Rng,
{
    let range = agent.boid.max_vision_distance / 2.0;
    let forward = agent.forward;
    let mut direction = forward;
    let mut step = 0usize;

    loop {
        if !oracle.raycast(agent.position, direction, range) {
            return if step == 0 { Vec3::ZERO } else { direction };
        }

        let cone_deg = step as f32 * AVOIDANCE_CONE_STEP_DEG;
        let jitter = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        direction = cone_rotation(jitter * cone_deg) * forward;
        step += 1;

        if step as f32 * AVOIDANCE_CONE_STEP_DEG >= AVOIDANCE_CONE_LIMIT_DEG {
            return -forward;
        }
    }
}

/// Rotation from per-axis Euler angles in degrees, applied z, then x, then y.
fn cone_rotation(euler_deg: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        euler_deg.y.to_radians(),
        euler_deg.x.to_radians(),
        euler_deg.z.to_radians(),
    )
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Blend all behaviours into a unit heading for `agent`.
///
/// Alignment, cohesion and separation only contribute when `neighbors` is
/// non-empty. If the weighted sum cancels out to zero the agent keeps its
/// current forward.
pub fn compute_direction<O, R>(
    agent: &AgentSnapshot,
    neighbors: &[NeighborState],
    target: Option<Vec3>,
    oracle: &O,
    rng: &mut R,
) -> Vec3
where
    O: ObstacleOracle + ?Sized,
    R: Rng,
{
    let w = agent.boid.weights;
    let mut direction = Vec3::ZERO;

    if !neighbors.is_empty() {
        direction += alignment(agent, neighbors) * w.alignment;
        direction += cohesion(agent, neighbors) * w.cohesion;
        direction += separation(agent, neighbors) * w.separation;
    }

    direction += seek(agent, target) * w.seek;
    direction += avoidance(agent, oracle, rng) * w.avoidance;

    direction.try_normalize().unwrap_or(agent.forward)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::engine::components::Weights;
    use crate::engine::obstacles::{NoObstacles, SphereField};

    const EPS: f32 = 1e-5;

    fn agent_at(position: Vec3, forward: Vec3, vision: f32, weights: Weights) -> AgentSnapshot {
        AgentSnapshot {
            position,
            forward,
            boid: Boid {
                max_vision_distance: vision,
                weights,
                ..Default::default()
            },
        }
    }

    fn facing(position: Vec3, forward: Vec3) -> NeighborState {
        NeighborState { position, forward }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn neighbor_state_mirrors_a_snapshot() {
        let snapshot = agent_at(Vec3::new(1.0, 2.0, 3.0), Vec3::Y, 10.0, Weights::default());
        assert_eq!(NeighborState::from(&snapshot), facing(Vec3::new(1.0, 2.0, 3.0), Vec3::Y));
    }

    #[test]
    fn influence_is_quadratic_in_distance() {
        let agent = agent_at(Vec3::ZERO, Vec3::Z, 10.0, Weights::default());
        assert!((influence(&agent, Vec3::new(5.0, 0.0, 0.0)) - 0.25).abs() < EPS);
        assert!((influence(&agent, Vec3::new(1.0, 0.0, 0.0)) - 0.01).abs() < EPS);
        assert_eq!(influence(&agent, Vec3::new(50.0, 0.0, 0.0)), 1.0);
        assert_eq!(influence(&agent, Vec3::ZERO), 0.0);
    }

    #[test]
    fn alignment_dominates_with_alignment_weight_only() {
        let agent = agent_at(Vec3::ZERO, Vec3::X, 10.0, Weights::new(1.0, 0.0, 0.0, 0.0, 0.0));
        let neighbors = [
            facing(Vec3::new(1.0, 0.0, 0.0), Vec3::Z),
            facing(Vec3::new(-1.0, 0.0, 0.0), Vec3::Z),
        ];
        let dir = compute_direction(&agent, &neighbors, None, &NoObstacles, &mut rng());
        assert!(dir.abs_diff_eq(Vec3::Z, EPS), "got {dir}");
    }

    #[test]
    fn seek_heads_for_target_when_alone() {
        let agent = agent_at(Vec3::ZERO, Vec3::X, 10.0, Weights::new(0.0, 0.0, 0.0, 1.0, 0.0));
        let dir = compute_direction(
            &agent,
            &[],
            Some(Vec3::new(0.0, 0.0, 100.0)),
            &NoObstacles,
            &mut rng(),
        );
        assert!(dir.abs_diff_eq(Vec3::Z, EPS), "got {dir}");
    }

    #[test]
    fn lone_agent_ignores_flocking_terms() {
        // Large flocking weights must not matter without neighbours.
        let agent = agent_at(Vec3::ZERO, Vec3::X, 10.0, Weights::new(100.0, 100.0, 100.0, 1.0, 1.0));
        let target = Vec3::new(0.0, 30.0, 40.0);
        let dir = compute_direction(&agent, &[], Some(target), &NoObstacles, &mut rng());
        let expected = target.normalize();
        assert!(dir.abs_diff_eq(expected, EPS), "got {dir}");
    }

    #[test]
    fn unobstructed_agent_without_goal_keeps_its_forward() {
        let forward = Vec3::new(1.0, 1.0, 0.0).normalize();
        let agent = agent_at(Vec3::ZERO, forward, 10.0, Weights::default());
        let dir = compute_direction(&agent, &[], None, &NoObstacles, &mut rng());
        assert_eq!(dir, forward);
    }

    #[test]
    fn cancelling_terms_fall_back_to_forward() {
        // Separation pushes +X, seek pulls -X with equal weight.
        let agent = agent_at(Vec3::ZERO, Vec3::Y, 10.0, Weights::new(0.0, 0.0, 1.0, 1.0, 0.0));
        let neighbors = [facing(Vec3::new(-2.0, 0.0, 0.0), Vec3::Y)];
        let dir = compute_direction(
            &agent,
            &neighbors,
            Some(Vec3::new(-5.0, 0.0, 0.0)),
            &NoObstacles,
            &mut rng(),
        );
        assert_eq!(dir, Vec3::Y);
    }

    #[test]
    fn cohesion_and_separation_point_opposite_ways() {
        let agent = agent_at(Vec3::ZERO, Vec3::Z, 10.0, Weights::default());
        let neighbors = [
            facing(Vec3::new(2.0, 0.0, 0.0), Vec3::Z),
            facing(Vec3::new(4.0, 0.0, 0.0), Vec3::Z),
        ];
        assert!(cohesion(&agent, &neighbors).abs_diff_eq(Vec3::X, EPS));
        assert!(separation(&agent, &neighbors).abs_diff_eq(-Vec3::X, EPS));
        assert_eq!(cohesion(&agent, &[]), Vec3::ZERO);
        assert_eq!(separation(&agent, &[]), Vec3::ZERO);
        assert_eq!(alignment(&agent, &[]), Vec3::ZERO);
    }

    #[test]
    fn clear_path_needs_no_avoidance() {
        let agent = agent_at(Vec3::ZERO, Vec3::Z, 10.0, Weights::default());
        assert_eq!(avoidance(&agent, &NoObstacles, &mut rng()), Vec3::ZERO);
    }

    #[test]
    fn avoidance_gives_up_with_an_about_face() {
        let casts = Cell::new(0usize);
        let blocked = |_: Vec3, _: Vec3, _: f32| {
            casts.set(casts.get() + 1);
            true
        };
        let forward = Vec3::new(0.3, -0.2, 0.9).normalize();
        let agent = agent_at(Vec3::ZERO, forward, 10.0, Weights::default());

        let dir = avoidance(&agent, &blocked, &mut rng());
        assert_eq!(dir, -forward);
        assert_eq!(casts.get(), MAX_AVOIDANCE_CASTS);
        assert_eq!(MAX_AVOIDANCE_CASTS, 18);
    }

    #[test]
    fn avoidance_casts_half_the_vision_distance() {
        let seen = Cell::new(0.0f32);
        let record = |_: Vec3, _: Vec3, max: f32| {
            seen.set(max);
            false
        };
        let agent = agent_at(Vec3::ZERO, Vec3::Z, 12.0, Weights::default());
        avoidance(&agent, &record, &mut rng());
        assert_eq!(seen.get(), 6.0);
    }

    #[test]
    fn avoidance_finds_a_nearby_clear_course() {
        // Only a narrow sliver straight ahead is blocked.
        let narrow = |_: Vec3, dir: Vec3, _: f32| dir.normalize().dot(Vec3::Z) > 0.99999;
        let agent = agent_at(Vec3::ZERO, Vec3::Z, 10.0, Weights::default());

        let dir = avoidance(&agent, &narrow, &mut rng());
        assert!(dir != Vec3::ZERO);
        assert!(dir != -Vec3::Z);
        assert!((dir.length() - 1.0).abs() < EPS);
        assert!(dir.dot(Vec3::Z) <= 0.99999);
        // Still heading roughly the same way.
        assert!(dir.dot(Vec3::Z) > 0.5);
    }

    #[test]
    fn avoidance_is_reproducible_for_a_seed() {
        let field = SphereField::default().with_sphere(Vec3::new(0.0, 0.0, 3.0), 1.0);
        let agent = agent_at(Vec3::ZERO, Vec3::Z, 10.0, Weights::default());
        let a = avoidance(&agent, &field, &mut StdRng::seed_from_u64(99));
        let b = avoidance(&agent, &field, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
        assert!(a != Vec3::ZERO);
        assert!(!field.raycast(Vec3::ZERO, a, 5.0) || a == -Vec3::Z);
    }
}
