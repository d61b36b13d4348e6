//! Traversal costs derived from cell states.
//!
//! | State | Cost |
//! |---|---|
//! | `free`, `explored`, `path`, `collectible`, `collected` | `1.0` |
//! | `unknown` | [`PlannerConfig::unknown_cost`] |
//! | `obstacle`, `wall` | impassable |
//!
//! With `obstacle_inflation_cells = r > 0` every non-solid cell within
//! Euclidean distance `r` of a solid cell gains
//! `inflation_penalty · (r + 1 − d) / (r + 1)`, using the nearest solid
//! cell.  Inflation only raises costs; it never makes a cell impassable.

use atlas_types::{CellState, GridCoord, OccupancyView};

use crate::astar::PlannerConfig;

/// Cost of entering a known passable cell.
pub const PASSABLE_COST: f32 = 1.0;

/// Floor for [`PlannerConfig::unknown_cost`]; unknown cells always cost
/// more than known passable ones.
pub const MIN_UNKNOWN_COST: f32 = 1.1;

/// Dense per-cell traversal cost.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMap {
    width: usize,
    height: usize,
    /// `None` marks an impassable cell.
    costs: Vec<Option<f32>>,
}

impl CostMap {
    /// Build a cost map from the current cell states of `view`.
    pub fn build<V: OccupancyView + ?Sized>(view: &V, config: &PlannerConfig) -> Self {
        let (width, height) = (view.width(), view.height());
        let unknown_cost = config.unknown_cost.max(MIN_UNKNOWN_COST);

        let mut costs = Vec::with_capacity(width * height);
        let mut solids = Vec::new();
        for gy in 0..height as i32 {
            for gx in 0..width as i32 {
                let coord = GridCoord::new(gx, gy);
                let state = view.state_at(coord).unwrap_or(CellState::Unknown);
                costs.push(match state {
                    CellState::Obstacle | CellState::Wall => {
                        solids.push(coord);
                        None
                    }
                    CellState::Unknown => Some(unknown_cost),
                    CellState::Free
                    | CellState::Explored
                    | CellState::Path
                    | CellState::Collectible
                    | CellState::Collected => Some(PASSABLE_COST),
                });
            }
        }

        let mut map = Self {
            width,
            height,
            costs,
        };
        if config.obstacle_inflation_cells > 0 {
            map.inflate(&solids, config.obstacle_inflation_cells, config.inflation_penalty);
        }
        map
    }

    fn inflate(&mut self, solids: &[GridCoord], radius: u32, penalty: f32) {
        let r = radius as i32;
        let r_f = radius as f32;
        let mut extra = vec![0.0_f32; self.costs.len()];
        for solid in solids {
            for dy in -r..=r {
                for dx in -r..=r {
                    let d = ((dx * dx + dy * dy) as f32).sqrt();
                    if d > r_f {
                        continue;
                    }
                    let Some(idx) = self.index(solid.offset(dx, dy)) else {
                        continue;
                    };
                    let bump = penalty * (r_f + 1.0 - d) / (r_f + 1.0);
                    extra[idx] = extra[idx].max(bump);
                }
            }
        }
        for (cost, bump) in self.costs.iter_mut().zip(extra) {
            if let Some(c) = cost {
                *c += bump;
            }
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        self.index(coord).is_some()
    }

    /// Row-major index of `coord`, or `None` when outside the map.
    pub fn index(&self, coord: GridCoord) -> Option<usize> {
        if coord.gx < 0
            || coord.gy < 0
            || coord.gx as usize >= self.width
            || coord.gy as usize >= self.height
        {
            return None;
        }
        Some(coord.gy as usize * self.width + coord.gx as usize)
    }

    pub fn coord(&self, index: usize) -> GridCoord {
        GridCoord::new((index % self.width) as i32, (index / self.width) as i32)
    }

    /// Cost of entering `coord`; `None` when impassable or out of bounds.
    pub fn cost(&self, coord: GridCoord) -> Option<f32> {
        self.index(coord).and_then(|i| self.costs[i])
    }

    /// True when `coord` is in bounds and impassable.
    pub fn is_solid(&self, coord: GridCoord) -> bool {
        self.index(coord).is_some_and(|i| self.costs[i].is_none())
    }
}
