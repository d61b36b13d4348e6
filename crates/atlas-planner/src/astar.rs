//! A* search over a [`CostMap`].
//!
//! Step cost is the destination cell's cost multiplied by the step length
//! (`1` orthogonal, `√2` diagonal).  Diagonal steps are refused when either
//! orthogonal neighbour they pass is solid.  Every cell cost is at least
//! `1.0`, so the octile heuristic is admissible and returned paths are
//! cost-optimal.
//!
//! # Example
//!
//! ```rust
//! use atlas_planner::{LocalPlanner, PlannerConfig};
//! use atlas_types::{CellState, FnGeometry, GridCoord, StateGrid, WorldPoint};
//!
//! let grid = StateGrid::filled(10, 10, CellState::Free);
//! let geometry = FnGeometry::new(
//!     |p: WorldPoint| GridCoord::new((p.x / 0.1).floor() as i32, (p.y / 0.1).floor() as i32),
//!     |c: GridCoord| WorldPoint::new((c.gx as f32 + 0.5) * 0.1, (c.gy as f32 + 0.5) * 0.1),
//! );
//!
//! let planner = LocalPlanner::new(PlannerConfig::default());
//! let path = planner
//!     .plan(&grid, &geometry, GridCoord::new(0, 0), GridCoord::new(9, 0))
//!     .unwrap();
//! assert_eq!(path.raw_path_length, 10);
//! assert_eq!(path.waypoints.last().unwrap().coord, GridCoord::new(9, 0));
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f32::consts::SQRT_2;
use std::time::Instant;

use atlas_types::{GridCoord, GridGeometry, OccupancyView, WorldPoint};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cost_map::CostMap;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tuning for [`LocalPlanner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Radius (cells) of the soft cost halo around solid cells.
    pub obstacle_inflation_cells: u32,
    /// Keep every n-th path cell as a waypoint.
    pub waypoint_spacing: usize,
    /// Cost of entering an `unknown` cell.  Values below
    /// [`MIN_UNKNOWN_COST`][crate::cost_map::MIN_UNKNOWN_COST] are raised to
    /// it.
    pub unknown_cost: f32,
    /// Extra cost right next to a solid cell when inflation is enabled.
    pub inflation_penalty: f32,
    /// Search the 8-connected grid; 4-connected otherwise.
    pub allow_diagonal: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            obstacle_inflation_cells: 0,
            waypoint_spacing: 3,
            unknown_cost: 3.0,
            inflation_penalty: 5.0,
            allow_diagonal: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors & outputs
// ─────────────────────────────────────────────────────────────────────────────

/// Why a plan could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanError {
    #[error("Cell ({gx}, {gy}) is out of bounds")]
    OutOfBounds { gx: i32, gy: i32 },

    #[error("Goal ({gx}, {gy}) is blocked")]
    Blocked { gx: i32, gy: i32 },

    #[error("Goal ({gx}, {gy}) is unreachable from ({sx}, {sy})")]
    Unreachable { sx: i32, sy: i32, gx: i32, gy: i32 },
}

/// A thinned path point with its world position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub coord: GridCoord,
    pub position: WorldPoint,
}

/// Result of a successful search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedPath {
    /// Every cell from start to goal inclusive.
    pub cells: Vec<GridCoord>,
    /// Every `waypoint_spacing`-th cell, always including both ends.
    pub waypoints: Vec<Waypoint>,
    /// Sum of step distances between cell centres (metres).
    pub length_m: f32,
    /// Accumulated step cost.
    pub total_cost: f32,
    /// Number of cells in [`cells`][Self::cells].
    pub raw_path_length: usize,
    pub planning_time_ms: f64,
}

/// Serializable success/failure record for outbound consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub waypoints: Vec<Waypoint>,
    pub length_m: f32,
    pub total_cost: f32,
    pub raw_path_length: usize,
    pub planning_time_ms: f64,
}

impl PlanReport {
    pub fn from_result(result: &Result<PlannedPath, PlanError>) -> Self {
        match result {
            Ok(path) => Self {
                success: true,
                error: None,
                waypoints: path.waypoints.clone(),
                length_m: path.length_m,
                total_cost: path.total_cost,
                raw_path_length: path.raw_path_length,
                planning_time_ms: path.planning_time_ms,
            },
            Err(e) => Self {
                success: false,
                error: Some(e.to_string()),
                waypoints: Vec::new(),
                length_m: 0.0,
                total_cost: 0.0,
                raw_path_length: 0,
                planning_time_ms: 0.0,
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Search
// ─────────────────────────────────────────────────────────────────────────────

/// Open-set entry, ordered so that [`BinaryHeap`] pops the lowest `f`.
#[derive(Debug, Clone, Copy)]
struct Node {
    f: f32,
    g: f32,
    index: usize,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| self.g.total_cmp(&other.g))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

const ORTHOGONAL: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const DIAGONAL: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Stateless A* planner.
#[derive(Debug, Clone, Default)]
pub struct LocalPlanner {
    config: PlannerConfig,
}

impl LocalPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan between two world positions, converting through `geometry`.
    pub fn plan_world<V, G>(
        &self,
        view: &V,
        geometry: &G,
        start: WorldPoint,
        goal: WorldPoint,
    ) -> Result<PlannedPath, PlanError>
    where
        V: OccupancyView + ?Sized,
        G: GridGeometry + ?Sized,
    {
        self.plan(
            view,
            geometry,
            geometry.world_to_grid(start),
            geometry.world_to_grid(goal),
        )
    }

    /// Plan between two grid cells.
    pub fn plan<V, G>(
        &self,
        view: &V,
        geometry: &G,
        start: GridCoord,
        goal: GridCoord,
    ) -> Result<PlannedPath, PlanError>
    where
        V: OccupancyView + ?Sized,
        G: GridGeometry + ?Sized,
    {
        let started = Instant::now();
        let map = CostMap::build(view, &self.config);

        for c in [start, goal] {
            if !map.in_bounds(c) {
                return Err(PlanError::OutOfBounds { gx: c.gx, gy: c.gy });
            }
        }
        if start == goal {
            return Ok(self.finish(geometry, vec![start], 0.0, started));
        }
        if map.is_solid(goal) {
            return Err(PlanError::Blocked {
                gx: goal.gx,
                gy: goal.gy,
            });
        }

        let (cells, cost) = self.search(&map, start, goal).ok_or(PlanError::Unreachable {
            sx: start.gx,
            sy: start.gy,
            gx: goal.gx,
            gy: goal.gy,
        })?;
        Ok(self.finish(geometry, cells, cost, started))
    }

    fn heuristic(&self, a: GridCoord, b: GridCoord) -> f32 {
        let dx = (a.gx - b.gx).abs() as f32;
        let dy = (a.gy - b.gy).abs() as f32;
        if self.config.allow_diagonal {
            dx + dy + (SQRT_2 - 2.0) * dx.min(dy)
        } else {
            dx + dy
        }
    }

    fn search(&self, map: &CostMap, start: GridCoord, goal: GridCoord) -> Option<(Vec<GridCoord>, f32)> {
        let n = map.width() * map.height();
        let start_idx = map.index(start)?;
        let goal_idx = map.index(goal)?;

        let mut g_score = vec![f32::INFINITY; n];
        let mut came_from: Vec<Option<usize>> = vec![None; n];
        let mut closed = vec![false; n];
        let mut open = BinaryHeap::new();

        g_score[start_idx] = 0.0;
        open.push(Node {
            f: self.heuristic(start, goal),
            g: 0.0,
            index: start_idx,
        });

        let mut expanded = 0usize;
        while let Some(Node { g, index, .. }) = open.pop() {
            if closed[index] {
                continue;
            }
            if index == goal_idx {
                debug!(expanded, cost = g, "goal reached");
                return Some((reconstruct(map, &came_from, goal_idx), g));
            }
            closed[index] = true;
            expanded += 1;

            let here = map.coord(index);
            let diagonals: &[(i32, i32)] = if self.config.allow_diagonal {
                &DIAGONAL
            } else {
                &[]
            };
            for &(dx, dy) in ORTHOGONAL.iter().chain(diagonals) {
                let next = here.offset(dx, dy);
                let Some(next_idx) = map.index(next) else {
                    continue;
                };
                if closed[next_idx] {
                    continue;
                }
                let Some(cell_cost) = map.cost(next) else {
                    continue;
                };
                let diagonal = dx != 0 && dy != 0;
                if diagonal && (map.is_solid(here.offset(dx, 0)) || map.is_solid(here.offset(0, dy))) {
                    continue;
                }
                let step = if diagonal { SQRT_2 } else { 1.0 };
                let tentative = g + cell_cost * step;
                if tentative < g_score[next_idx] {
                    g_score[next_idx] = tentative;
                    came_from[next_idx] = Some(index);
                    open.push(Node {
                        f: tentative + self.heuristic(next, goal),
                        g: tentative,
                        index: next_idx,
                    });
                }
            }
        }
        debug!(expanded, "open set exhausted");
        None
    }

    fn finish<G: GridGeometry + ?Sized>(
        &self,
        geometry: &G,
        cells: Vec<GridCoord>,
        total_cost: f32,
        started: Instant,
    ) -> PlannedPath {
        let length_m: f32 = cells
            .windows(2)
            .map(|w| geometry.grid_to_world(w[0]).distance(geometry.grid_to_world(w[1])))
            .sum();

        let spacing = self.config.waypoint_spacing.max(1);
        let last = cells.len() - 1;
        let waypoints = cells
            .iter()
            .enumerate()
            .filter(|(i, _)| i % spacing == 0 || *i == last)
            .map(|(_, &coord)| Waypoint {
                coord,
                position: geometry.grid_to_world(coord),
            })
            .collect();

        let planning_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!(
            cells = cells.len(),
            length_m,
            total_cost,
            planning_time_ms,
            "path planned"
        );
        PlannedPath {
            raw_path_length: cells.len(),
            cells,
            waypoints,
            length_m,
            total_cost,
            planning_time_ms,
        }
    }
}

fn reconstruct(map: &CostMap, came_from: &[Option<usize>], goal: usize) -> Vec<GridCoord> {
    let mut path = vec![map.coord(goal)];
    let mut current = goal;
    while let Some(prev) = came_from[current] {
        path.push(map.coord(prev));
        current = prev;
    }
    path.reverse();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
