// Spatial hash grid for bounded-radius neighbour lookup.
//
// Cells are keyed by `round(position / cell_size)` per axis, so cell k covers
// [(k - 0.5) * size, (k + 0.5) * size), give or take the even-tie rule. A
// query scans every cell between cell_of(center - r) and cell_of(center + r)
// per axis: the 3x3x3 block when r equals the cell size, one cell wider on a
// side where a rounding tie pushes the far edge over.
//
// Unlike a rebuild-every-frame grid, membership here is persistent: agents are
// inserted once, relocated when they cross a cell boundary and removed on
// despawn. A reverse id -> cell map keeps removal independent of the agent's
// (possibly already changed) position.

use std::collections::HashMap;

use bevy_ecs::entity::Entity;
use glam::{IVec3, Vec3};

use super::error::{FlockError, FlockResult};

pub struct SpatialHashGrid {
    cell_size: f32,
    buckets: HashMap<IVec3, Vec<Entity>>,
    /// Where each live agent currently lives. Source of truth for remove/relocate.
    cell_by_agent: HashMap<Entity, IVec3>,
    /// Last known position per agent, used for the exact distance test.
    positions: HashMap<Entity, Vec3>,
}

impl SpatialHashGrid {
    pub fn new(cell_size: f32) -> FlockResult<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(FlockError::InvalidCellSize(cell_size));
        }
        Ok(Self {
            cell_size,
            buckets: HashMap::new(),
            cell_by_agent: HashMap::new(),
            positions: HashMap::new(),
        })
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of agents stored.
    pub fn len(&self) -> usize {
        self.cell_by_agent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_by_agent.is_empty()
    }

    pub fn contains(&self, agent: Entity) -> bool {
        self.cell_by_agent.contains_key(&agent)
    }

    /// Discretize a world position. Ties round to the even integer.
    pub fn cell_of(&self, position: Vec3) -> IVec3 {
        let scaled = position / self.cell_size;
        IVec3::new(
            scaled.x.round_ties_even() as i32,
            scaled.y.round_ties_even() as i32,
            scaled.z.round_ties_even() as i32,
        )
    }

    /// World-space centre of a cell.
    pub fn cell_center(&self, cell: IVec3) -> Vec3 {
        cell.as_vec3() * self.cell_size
    }

    pub fn cell_of_agent(&self, agent: Entity) -> FlockResult<IVec3> {
        self.cell_by_agent
            .get(&agent)
            .copied()
            .ok_or(FlockError::UnknownAgent(agent))
    }

    /// Insert `agent` at `position`.
    ///
    /// Inserting into the cell the agent already occupies does not duplicate
    /// it; inserting into another cell moves it there.
    pub fn insert(&mut self, agent: Entity, position: Vec3) {
        let cell = self.cell_of(position);
        self.positions.insert(agent, position);
        match self.cell_by_agent.get(&agent).copied() {
            Some(current) if current == cell => {}
            Some(current) => {
                self.detach(agent, current);
                self.attach(agent, cell);
            }
            None => self.attach(agent, cell),
        }
    }

    /// Erase `agent` from the grid. Returns the cell it was removed from.
    pub fn remove(&mut self, agent: Entity) -> FlockResult<IVec3> {
        let cell = self
            .cell_by_agent
            .remove(&agent)
            .ok_or(FlockError::UnknownAgent(agent))?;
        self.positions.remove(&agent);
        self.detach_bucket(agent, cell);
        Ok(cell)
    }

    /// Record a new position for `agent`, moving it between buckets if its
    /// cell changed. Returns `true` when the agent switched cells.
    pub fn relocate(&mut self, agent: Entity, position: Vec3) -> FlockResult<bool> {
        let current = self.cell_of_agent(agent)?;
        self.positions.insert(agent, position);
        let cell = self.cell_of(position);
        if cell == current {
            return Ok(false);
        }
        self.detach(agent, current);
        self.attach(agent, cell);
        Ok(true)
    }

    /// Up to `limit` agents within `radius` (inclusive) of `center`.
    ///
    /// This is not a nearest-neighbour query: cells are visited in a fixed
    /// order (centre layer, then +y, then -y; rows +z to -z; columns -x to +x;
    /// newest bucket entries first) and the scan stops as soon as `limit`
    /// agents are found, so crowded early cells crowd out later ones.
    ///
    /// Work is bounded by the number of occupied cells, whatever the radius.
    pub fn query(&self, center: Vec3, radius: f32, limit: usize) -> Vec<Entity> {
        let mut found = Vec::new();
        if limit == 0 || !radius.is_finite() || radius < 0.0 || !center.is_finite() {
            return found;
        }

        let origin = self.cell_of(center);
        let lo = self.cell_of(center - Vec3::splat(radius));
        let hi = self.cell_of(center + Vec3::splat(radius));
        let radius_sq = radius * radius;

        for cell in self.occupied_in_scan_order(origin, lo, hi) {
            let Some(bucket) = self.buckets.get(&cell) else {
                continue;
            };
            for &agent in bucket.iter().rev() {
                let Some(&position) = self.positions.get(&agent) else {
                    continue;
                };
                if position.distance_squared(center) <= radius_sq {
                    found.push(agent);
                    if found.len() >= limit {
                        return found;
                    }
                }
            }
        }
        found
    }

    /// Non-empty cells and their occupants.
    pub fn cells(&self) -> impl Iterator<Item = (IVec3, &[Entity])> {
        self.buckets
            .iter()
            .map(|(cell, agents)| (*cell, agents.as_slice()))
    }

    /// Occupied cells inside `lo..=hi`, sorted for scanning from `origin`.
    ///
    /// Small boxes are walked cell by cell; boxes with more cells than there
    /// are buckets filter the buckets instead.
    fn occupied_in_scan_order(&self, origin: IVec3, lo: IVec3, hi: IVec3) -> Vec<IVec3> {
        let mut cells: Vec<IVec3> = if box_volume(lo, hi) <= self.buckets.len() as u64 {
            (lo.y..=hi.y)
                .flat_map(|y| (lo.z..=hi.z).flat_map(move |z| (lo.x..=hi.x).map(move |x| IVec3::new(x, y, z))))
                .filter(|cell| self.buckets.contains_key(cell))
                .collect()
        } else {
            self.buckets
                .keys()
                .copied()
                .filter(|cell| cell.cmpge(lo).all() && cell.cmple(hi).all())
                .collect()
        };
        cells.sort_unstable_by_key(|&cell| scan_key(origin, cell));
        cells
    }

    fn attach(&mut self, agent: Entity, cell: IVec3) {
        self.buckets.entry(cell).or_default().push(agent);
        self.cell_by_agent.insert(agent, cell);
    }

    fn detach(&mut self, agent: Entity, cell: IVec3) {
        self.detach_bucket(agent, cell);
        self.cell_by_agent.remove(&agent);
    }

    fn detach_bucket(&mut self, agent: Entity, cell: IVec3) {
        if let Some(bucket) = self.buckets.get_mut(&cell) {
            if let Some(slot) = bucket.iter().position(|&a| a == agent) {
                // Keep insertion order so query results stay reproducible.
                bucket.remove(slot);
            }
            if bucket.is_empty() {
                self.buckets.remove(&cell);
            }
        }
    }
}

/// Sort key placing `cell` in scan order relative to `origin`.
fn scan_key(origin: IVec3, cell: IVec3) -> (i64, bool, i64, i64) {
    let dy = i64::from(cell.y) - i64::from(origin.y);
    let dz = i64::from(cell.z) - i64::from(origin.z);
    let dx = i64::from(cell.x) - i64::from(origin.x);
    (dy.abs(), dy < 0, -dz, dx)
}

/// Cells in the inclusive box `lo..=hi`, saturating instead of overflowing.
fn box_volume(lo: IVec3, hi: IVec3) -> u64 {
    let extent = |a: i32, b: i32| (i64::from(b) - i64::from(a) + 1).max(0) as u64;
    extent(lo.x, hi.x)
        .saturating_mul(extent(lo.y, hi.y))
        .saturating_mul(extent(lo.z, hi.z))
}
