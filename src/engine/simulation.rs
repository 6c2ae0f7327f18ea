// Fixed-step flock driver.
//
// Owns the ECS World (agent components, stable generational ids), the
// spatial hash grid, the scenery oracle, the goal provider and the RNG.
//
// Each tick runs three phases, strictly in order:
//   (a) query: every agent snapshots itself and asks the grid for neighbours
//   (b) steer: compute headings, turn, set velocities, optionally move
//   (c) rebin: relocate every agent whose cell changed
// Grid membership only changes in (c), so all queries within a tick see the
// buckets as they were at the end of the previous tick.

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use glam::Vec3;
use log::{debug, trace};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::components::*;
use super::config::{AgentSpawn, SwarmConfig};
use super::debug::TickStats;
use super::error::{FlockError, FlockResult};
use super::obstacles::ObstacleOracle;
use super::spatial::SpatialHashGrid;
use super::steering::{AgentSnapshot, NeighborState, compute_direction};
use super::systems::{movement_system, steer};

/// Supplies the point the flock seeks. `None` disables seeking.
pub trait TargetProvider {
    fn target(&self) -> Option<Vec3>;
}

impl TargetProvider for Option<Vec3> {
    fn target(&self) -> Option<Vec3> {
        *self
    }
}

impl TargetProvider for Vec3 {
    fn target(&self) -> Option<Vec3> {
        Some(*self)
    }
}

/// Read-only copy of one agent's state, for renderers and debug tools.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentView {
    pub id: Entity,
    pub position: Vec3,
    pub forward: Vec3,
    pub velocity: Vec3,
    pub boid: Boid,
}

pub struct Simulation {
    config: SwarmConfig,
    world: World,
    grid: SpatialHashGrid,
    oracle: Box<dyn ObstacleOracle>,
    target: Box<dyn TargetProvider>,
    rng: StdRng,
    tick: u64,
}

impl Simulation {
    pub fn new(config: SwarmConfig, oracle: impl ObstacleOracle + 'static) -> FlockResult<Self> {
        config.validate()?;
        let grid = SpatialHashGrid::new(config.max_vision_distance)?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            world: World::new(),
            grid,
            oracle: Box::new(oracle),
            target: Box::new(None::<Vec3>),
            rng,
            tick: 0,
        })
    }

    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    pub fn grid(&self) -> &SpatialHashGrid {
        &self.grid
    }

    /// Shared random source, e.g. for spawn placement.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn set_target(&mut self, target: Option<Vec3>) {
        self.target = Box::new(target);
    }

    pub fn set_target_provider(&mut self, provider: impl TargetProvider + 'static) {
        self.target = Box::new(provider);
    }

    pub fn target(&self) -> Option<Vec3> {
        self.target.target()
    }

    pub fn set_obstacle_oracle(&mut self, oracle: impl ObstacleOracle + 'static) {
        self.oracle = Box::new(oracle);
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Add an agent and bucket it in the grid.
    ///
    /// Fails without side effects if the agent's parameters could produce
    /// NaNs, or if its vision reaches past one grid cell.
    pub fn register(&mut self, spawn: AgentSpawn) -> FlockResult<Entity> {
        spawn.boid.validate()?;
        let cell_size = self.grid.cell_size();
        if spawn.boid.max_vision_distance > cell_size {
            return Err(FlockError::VisionExceedsCellSize {
                vision: spawn.boid.max_vision_distance,
                cell_size,
            });
        }
        if !spawn.position.is_finite() {
            return Err(FlockError::InvalidConfig("spawn position must be finite"));
        }

        let transform = Transform::new(spawn.position, spawn.forward);
        let id = self
            .world
            .spawn((transform, Velocity::default(), spawn.boid))
            .id();
        self.grid.insert(id, transform.position);
        debug!("registered agent {id:?} at {}", transform.position);
        Ok(id)
    }

    /// Remove an agent from the grid and the world.
    pub fn unregister(&mut self, id: Entity) -> FlockResult<()> {
        let cell = self.grid.remove(id)?;
        self.world.despawn(id);
        debug!("unregistered agent {id:?} from cell {cell}");
        Ok(())
    }

    /// Overwrite an agent's position (e.g. after an external physics step).
    /// Grid membership follows immediately.
    pub fn set_position(&mut self, id: Entity, position: Vec3) -> FlockResult<()> {
        let mut transform = self
            .world
            .get_mut::<Transform>(id)
            .ok_or(FlockError::UnknownAgent(id))?;
        transform.position = position;
        self.grid.relocate(id, position)?;
        Ok(())
    }

    // ========================================================================
    // TICK
    // ========================================================================

    /// Advance the flock by `delta_time` seconds.
    pub fn tick(&mut self, delta_time: f32) -> FlockResult<TickStats> {
        if !delta_time.is_finite() || delta_time < 0.0 {
            return Err(FlockError::InvalidDeltaTime(delta_time));
        }

        // (a) snapshot + neighbour queries, read-only against the grid.
        let mut query = self.world.query::<(Entity, &Transform, &Boid)>();
        let mut snapshots: Vec<(Entity, AgentSnapshot)> = query
            .iter(&self.world)
            .map(|(id, transform, boid)| (id, AgentSnapshot::new(transform, boid)))
            .collect();
        snapshots.sort_unstable_by_key(|(id, _)| *id);

        let slot_of: HashMap<Entity, usize> = snapshots
            .iter()
            .enumerate()
            .map(|(slot, (id, _))| (*id, slot))
            .collect();

        let mut neighborhoods = Vec::with_capacity(snapshots.len());
        for (id, snapshot) in &snapshots {
            let found = self.grid.query(
                snapshot.position,
                snapshot.boid.max_vision_distance,
                self.config.max_neighbors,
            );
            let mut neighbors = Vec::with_capacity(found.len());
            for other in found.into_iter().filter(|other| other != id) {
                let slot = *slot_of.get(&other).ok_or(FlockError::UnknownAgent(other))?;
                let (_, them) = &snapshots[slot];
                neighbors.push(NeighborState::from(them));
            }
            neighborhoods.push(neighbors);
        }

        // (b) steering + heading integration.
        let target = self.target.target();
        let mut neighbor_links = 0;
        for ((id, snapshot), neighbors) in snapshots.iter().zip(&neighborhoods) {
            neighbor_links += neighbors.len();
            let desired = compute_direction(snapshot, neighbors, target, &*self.oracle, &mut self.rng);

            let mut transform = Transform {
                position: snapshot.position,
                forward: snapshot.forward,
            };
            let mut velocity = Velocity::default();
            steer(&mut transform, &mut velocity, &snapshot.boid, desired, delta_time);

            self.world
                .get_mut::<Transform>(*id)
                .ok_or(FlockError::UnknownAgent(*id))?
                .forward = transform.forward;
            self.world
                .get_mut::<Velocity>(*id)
                .ok_or(FlockError::UnknownAgent(*id))?
                .linear = velocity.linear;
        }
        if self.config.integrate_positions {
            movement_system(&mut self.world, delta_time);
        }

        // (c) grid relocation, after every position for this tick is final.
        let mut relocated = 0;
        let mut query = self.world.query::<(Entity, &Transform)>();
        for (id, transform) in query.iter(&self.world) {
            if self.grid.relocate(id, transform.position)? {
                relocated += 1;
            }
        }

        self.tick += 1;
        let stats = TickStats {
            tick: self.tick,
            agents: snapshots.len(),
            neighbor_links,
            relocated,
        };
        trace!(
            "tick {}: {} agents, {} neighbour links, {} relocated",
            stats.tick, stats.agents, stats.neighbor_links, stats.relocated
        );
        Ok(stats)
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    /// Approximate neighbour query; see `SpatialHashGrid::query`.
    pub fn query_neighbors(&self, position: Vec3, radius: f32, limit: usize) -> Vec<Entity> {
        self.grid.query(position, radius, limit)
    }

    /// The neighbours `id` would steer with this tick (itself excluded).
    pub fn neighbors_of(&self, id: Entity) -> FlockResult<Vec<Entity>> {
        let agent = self.agent(id)?;
        let mut found = self.grid.query(
            agent.position,
            agent.boid.max_vision_distance,
            self.config.max_neighbors,
        );
        found.retain(|other| *other != id);
        Ok(found)
    }

    pub fn agent(&self, id: Entity) -> FlockResult<AgentView> {
        if !self.grid.contains(id) {
            return Err(FlockError::UnknownAgent(id));
        }
        let world = &self.world;
        match (world.get::<Transform>(id), world.get::<Velocity>(id), world.get::<Boid>(id)) {
            (Some(transform), Some(velocity), Some(boid)) => Ok(AgentView {
                id,
                position: transform.position,
                forward: transform.forward,
                velocity: velocity.linear,
                boid: *boid,
            }),
            _ => Err(FlockError::UnknownAgent(id)),
        }
    }

    /// Current unit facing of `id`.
    pub fn heading(&self, id: Entity) -> FlockResult<Vec3> {
        Ok(self.agent(id)?.forward)
    }

    pub fn velocity(&self, id: Entity) -> FlockResult<Vec3> {
        Ok(self.agent(id)?.velocity)
    }

    /// Every live agent, ordered by id.
    pub fn agents(&mut self) -> Vec<AgentView> {
        let mut query = self.world.query::<(Entity, &Transform, &Velocity, &Boid)>();
        let mut views: Vec<AgentView> = query
            .iter(&self.world)
            .map(|(id, transform, velocity, boid)| AgentView {
                id,
                position: transform.position,
                forward: transform.forward,
                velocity: velocity.linear,
                boid: *boid,
            })
            .collect();
        views.sort_unstable_by_key(|view| view.id);
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::obstacles::NoObstacles;

    const EPS: f32 = 1e-5;

    fn config() -> SwarmConfig {
        SwarmConfig {
            max_vision_distance: 10.0,
            ..Default::default()
        }
    }

    #[test]
    fn register_validates_parameters() {
        let mut sim = Simulation::new(config(), NoObstacles).unwrap();
        let mut spawn = sim.config().spawn(Vec3::ZERO, Vec3::Z);

        spawn.boid.max_vision_distance = 0.0;
        assert_eq!(sim.register(spawn), Err(FlockError::InvalidVisionDistance(0.0)));

        spawn.boid.max_vision_distance = 20.0;
        assert_eq!(
            sim.register(spawn),
            Err(FlockError::VisionExceedsCellSize { vision: 20.0, cell_size: 10.0 })
        );

        spawn.boid.max_vision_distance = 5.0;
        spawn.position = Vec3::NAN;
        assert!(sim.register(spawn).is_err());
        assert!(sim.is_empty());
    }

    #[test]
    fn construction_fails_fast_on_bad_config() {
        let bad = SwarmConfig { max_vision_distance: -1.0, ..Default::default() };
        assert!(Simulation::new(bad, NoObstacles).is_err());
    }

    #[test]
    fn unregister_removes_from_grid_and_world() {
        let mut sim = Simulation::new(config(), NoObstacles).unwrap();
        let a = sim.register(sim.config().spawn(Vec3::ZERO, Vec3::Z)).unwrap();
        let b = sim.register(sim.config().spawn(Vec3::X, Vec3::Z)).unwrap();

        sim.unregister(a).unwrap();
        assert_eq!(sim.query_neighbors(Vec3::ZERO, 10.0, 10), vec![b]);
        assert_eq!(sim.agent(a), Err(FlockError::UnknownAgent(a)));
        assert_eq!(sim.unregister(a), Err(FlockError::UnknownAgent(a)));
        assert_eq!(sim.len(), 1);
        assert!(sim.tick(0.02).is_ok());
    }

    #[test]
    fn tick_rejects_bad_delta() {
        let mut sim = Simulation::new(config(), NoObstacles).unwrap();
        assert_eq!(sim.tick(-1.0), Err(FlockError::InvalidDeltaTime(-1.0)));
        assert!(sim.tick(f32::NAN).is_err());
        assert_eq!(sim.ticks(), 0);
    }

    #[test]
    fn lone_agent_cruises_straight() {
        let mut sim = Simulation::new(config(), NoObstacles).unwrap();
        let id = sim.register(sim.config().spawn(Vec3::ZERO, Vec3::X)).unwrap();

        for _ in 0..14 {
            sim.tick(0.1).unwrap();
        }

        let agent = sim.agent(id).unwrap();
        assert!(agent.forward.abs_diff_eq(Vec3::X, EPS));
        assert!(agent.velocity.abs_diff_eq(Vec3::X * 5.0, EPS));
        assert!(agent.position.abs_diff_eq(Vec3::X * 7.0, 1e-4));
        assert_eq!(sim.grid().cell_of_agent(id), Ok(glam::IVec3::X));
    }

    #[test]
    fn external_positions_are_rebinned() {
        let cfg = SwarmConfig { integrate_positions: false, ..config() };
        let mut sim = Simulation::new(cfg, NoObstacles).unwrap();
        let id = sim.register(sim.config().spawn(Vec3::ZERO, Vec3::X)).unwrap();

        sim.tick(1.0).unwrap();
        assert_eq!(sim.agent(id).unwrap().position, Vec3::ZERO);

        sim.set_position(id, Vec3::new(0.0, 0.0, 42.0)).unwrap();
        assert_eq!(sim.grid().cell_of_agent(id), Ok(glam::IVec3::new(0, 0, 4)));
        assert!(sim.query_neighbors(Vec3::ZERO, 10.0, 10).is_empty());
    }

    #[test]
    fn neighbors_exclude_self() {
        let mut sim = Simulation::new(config(), NoObstacles).unwrap();
        let a = sim.register(sim.config().spawn(Vec3::ZERO, Vec3::Z)).unwrap();
        let b = sim.register(sim.config().spawn(Vec3::new(2.0, 0.0, 0.0), Vec3::Z)).unwrap();
        let far = sim.register(sim.config().spawn(Vec3::new(50.0, 0.0, 0.0), Vec3::Z)).unwrap();

        assert_eq!(sim.neighbors_of(a), Ok(vec![b]));
        assert_eq!(sim.neighbors_of(far), Ok(vec![]));
    }

    #[test]
    fn target_provider_steers_the_flock() {
        let cfg = SwarmConfig {
            weights: Weights::new(0.0, 0.0, 0.0, 1.0, 0.0),
            turn_speed: 100.0,
            ..config()
        };
        let mut sim = Simulation::new(cfg, NoObstacles).unwrap();
        sim.set_target_provider(Vec3::new(0.0, 100.0, 0.0));
        let id = sim.register(sim.config().spawn(Vec3::ZERO, Vec3::X)).unwrap();

        sim.tick(0.1).unwrap();
        assert!(sim.heading(id).unwrap().abs_diff_eq(Vec3::Y, EPS));

        sim.set_target(None);
        assert_eq!(sim.target(), None);
    }

    #[test]
    fn swapped_obstacle_oracle_applies_next_tick() {
        let cfg = SwarmConfig {
            weights: Weights::new(0.0, 0.0, 0.0, 0.0, 1.0),
            turn_speed: 1000.0,
            integrate_positions: false,
            ..config()
        };
        let mut sim = Simulation::new(cfg, NoObstacles).unwrap();
        let id = sim.register(sim.config().spawn(Vec3::ZERO, Vec3::Z)).unwrap();

        sim.tick(0.02).unwrap();
        assert!(sim.heading(id).unwrap().abs_diff_eq(Vec3::Z, EPS));

        sim.set_obstacle_oracle(|_: Vec3, _: Vec3, _: f32| true);
        sim.tick(0.02).unwrap();
        assert!(sim.heading(id).unwrap().abs_diff_eq(-Vec3::Z, EPS));
    }
}
