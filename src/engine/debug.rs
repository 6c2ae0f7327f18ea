// Inspection data for debug-draw collaborators. Nothing here feeds back into the tick.

use glam::{IVec3, Vec3};

use super::spatial::SpatialHashGrid;

/// Counters from one `Simulation::tick`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Ticks completed, this one included.
    pub tick: u64,
    pub agents: usize,
    /// Sum of neighbour-list lengths over all agents.
    pub neighbor_links: usize,
    /// Agents that moved to a different grid cell.
    pub relocated: usize,
}

impl TickStats {
    pub fn mean_neighbors(&self) -> f32 {
        if self.agents == 0 {
            0.0
        } else {
            self.neighbor_links as f32 / self.agents as f32
        }
    }
}

/// One occupied grid cell, ready to draw as a wire cube with a count label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellDebugDraw {
    pub cell: IVec3,
    /// World-space centre of the cell.
    pub center: Vec3,
    /// Side length of the cube.
    pub size: f32,
    pub occupants: usize,
}

/// Occupied cells sorted by coordinate.
pub fn grid_cells(grid: &SpatialHashGrid) -> Vec<CellDebugDraw> {
    let mut cells: Vec<CellDebugDraw> = grid
        .cells()
        .filter(|(_, agents)| !agents.is_empty())
        .map(|(cell, agents)| CellDebugDraw {
            cell,
            center: grid.cell_center(cell),
            size: grid.cell_size(),
            occupants: agents.len(),
        })
        .collect();
    cells.sort_unstable_by_key(|c| (c.cell.x, c.cell.y, c.cell.z));
    cells
}
