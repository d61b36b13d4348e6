//! Spatial Predictor.
//!
//! Fills unobserved cells with low-confidence guesses using four
//! deterministic heuristics, so that consumers see a less sparse map before
//! real observations arrive.  No learned model is involved.
//!
//! A cell is a *source* for the heuristics only when it has been directly
//! observed ([`GridCell::is_observed`]); a cell is a *target* only when it has
//! not (it is `unknown`, or carries an earlier prediction or second-hand fleet
//! data).  Predictions therefore never feed further predictions.
//!
//! # Heuristics (applied in order, first writer per cell wins each pass)
//!
//! 1. **Wall continuation** – a solid cell with a solid neighbour behind it
//!    extends the run forward.
//! 2. **Corridor detection** – passable runs flanked on both sides by solid
//!    cells are extended at both ends, centreline `free`, flanks `wall`.
//! 3. **Open-space expansion** – a passable cell with ≥ 2 passable
//!    4-neighbours predicts its unobserved 4-neighbours `free`.
//! 4. **Boundary walls** – once more than a few edge cells are observed as
//!    `wall`, the rest of the outer ring is predicted `wall`.
//!
//! # Verification
//!
//! At the start of every pass each outstanding prediction is compared against
//! its live cell.  Once the cell carries a higher confidence and a newer
//! timestamp than the prediction, it is scored (solid vs. passable class) and
//! dropped from the registry.
//!
//! # Example
//!
//! ```rust
//! use atlas_perception::grid::OccupancyGrid;
//! use atlas_perception::predictor::{PredictorConfig, SpatialPredictor};
//! use atlas_types::{CellState, GridCoord};
//!
//! let mut grid = OccupancyGrid::new(20, 20, 10.0);
//! grid.observe(GridCoord::new(5, 5), CellState::Wall, 0.95, 1);
//! grid.observe(GridCoord::new(6, 5), CellState::Wall, 0.95, 1);
//!
//! let mut predictor = SpatialPredictor::new(PredictorConfig::default());
//! let report = predictor.run_pass(&mut grid, 10);
//! assert!(report.applied > 0);
//! assert_eq!(grid.cell(GridCoord::new(7, 5)).unwrap().state, CellState::Wall);
//! assert_eq!(predictor.stats().accuracy, 1.0);
//! ```

use std::collections::HashMap;

use atlas_types::{CellState, GridCoord, OccupancyView, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::{GridCell, OccupancyGrid};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tuning for [`SpatialPredictor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Maximum number of cells a run or corridor is extrapolated.
    pub max_extrapolation: usize,
    /// Minimum flanked run length recognised as a corridor.
    pub min_corridor_length: usize,
    /// Confidence of the first extrapolated wall cell.
    pub wall_confidence: f32,
    /// Confidence of the first extrapolated corridor cell.
    pub corridor_confidence: f32,
    pub open_space_confidence: f32,
    pub boundary_confidence: f32,
    /// Boundary prediction fires once more than this many edge cells are
    /// observed walls.
    pub boundary_min_walls: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            max_extrapolation: 3,
            min_corridor_length: 3,
            wall_confidence: 0.5,
            corridor_confidence: 0.4,
            open_space_confidence: 0.3,
            boundary_confidence: 0.4,
            boundary_min_walls: 3,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// Which heuristic produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    WallContinuation,
    Corridor,
    OpenSpace,
    BoundaryWall,
}

/// One outstanding guess about an unobserved cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub coord: GridCoord,
    pub state: CellState,
    pub confidence: f32,
    pub source: Heuristic,
    pub timestamp: Timestamp,
}

/// Outcome of a single [`SpatialPredictor::run_pass`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Distinct cells proposed by the heuristics this pass.
    pub proposed: usize,
    /// Proposals actually written into the grid.
    pub applied: usize,
    /// Earlier predictions confirmed this pass.
    pub verified: usize,
    /// Earlier predictions contradicted this pass.
    pub wrong: usize,
}

/// Running totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictorStats {
    /// Predictions still awaiting verification.
    pub prediction_count: usize,
    pub verified: u64,
    pub wrong: u64,
    /// `verified / (verified + wrong)`; `1.0` before any prediction resolved.
    pub accuracy: f32,
}

// ─────────────────────────────────────────────────────────────────────────────
// SpatialPredictor
// ─────────────────────────────────────────────────────────────────────────────

/// Heuristic fill-in of unobserved cells with accuracy tracking.
#[derive(Debug, Clone, Default)]
pub struct SpatialPredictor {
    config: PredictorConfig,
    registry: HashMap<GridCoord, Prediction>,
    verified: u64,
    wrong: u64,
}

/// Per-pass proposals, first writer wins.
struct Proposals {
    now: Timestamp,
    cells: HashMap<GridCoord, Prediction>,
}

impl Proposals {
    fn propose(&mut self, coord: GridCoord, state: CellState, confidence: f32, source: Heuristic) {
        let now = self.now;
        self.cells.entry(coord).or_insert(Prediction {
            coord,
            state,
            confidence,
            source,
            timestamp: now,
        });
    }
}

fn is_source(cell: Option<&GridCell>) -> bool {
    cell.is_some_and(|c| c.is_observed())
}

fn is_target(grid: &OccupancyGrid, coord: GridCoord) -> bool {
    grid.cell(coord).is_some_and(|c| !c.is_observed())
}

fn observed_solid(grid: &OccupancyGrid, coord: GridCoord) -> bool {
    grid.cell(coord)
        .is_some_and(|c| c.is_observed() && c.state.is_solid())
}

fn observed_passable(grid: &OccupancyGrid, coord: GridCoord) -> bool {
    grid.cell(coord)
        .is_some_and(|c| c.is_observed() && c.state.is_passable())
}

const DIRS4: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

impl SpatialPredictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Outstanding predictions, in no particular order.
    pub fn predictions(&self) -> impl Iterator<Item = &Prediction> {
        self.registry.values()
    }

    pub fn prediction_at(&self, coord: GridCoord) -> Option<&Prediction> {
        self.registry.get(&coord)
    }

    /// Verify outstanding predictions, then run every heuristic and apply
    /// the proposals to `grid`.
    pub fn run_pass(&mut self, grid: &mut OccupancyGrid, now: Timestamp) -> PassReport {
        let (verified, wrong) = self.verify(grid);

        let mut proposals = Proposals {
            now,
            cells: HashMap::new(),
        };
        self.wall_continuation(grid, &mut proposals);
        self.corridors(grid, &mut proposals, true);
        self.corridors(grid, &mut proposals, false);
        self.open_space(grid, &mut proposals);
        self.boundary_walls(grid, &mut proposals);

        let proposed = proposals.cells.len();
        let mut applied = 0;
        for (coord, prediction) in proposals.cells {
            if grid.apply_prediction(coord, prediction.state, prediction.confidence) {
                self.registry.insert(coord, prediction);
                applied += 1;
            }
        }

        debug!(
            proposed,
            applied,
            verified,
            wrong,
            outstanding = self.registry.len(),
            "prediction pass"
        );
        PassReport {
            proposed,
            applied,
            verified,
            wrong,
        }
    }

    pub fn stats(&self) -> PredictorStats {
        let resolved = self.verified + self.wrong;
        PredictorStats {
            prediction_count: self.registry.len(),
            verified: self.verified,
            wrong: self.wrong,
            accuracy: if resolved == 0 {
                1.0
            } else {
                self.verified as f32 / resolved as f32
            },
        }
    }

    /// Drop every outstanding prediction and zero the counters.
    pub fn reset(&mut self) {
        self.registry.clear();
        self.verified = 0;
        self.wrong = 0;
    }

    fn verify(&mut self, grid: &OccupancyGrid) -> (usize, usize) {
        let mut verified = 0;
        let mut wrong = 0;
        self.registry.retain(|coord, p| {
            let Some(cell) = grid.cell(*coord) else {
                return false;
            };
            if cell.confidence > p.confidence && cell.last_update > p.timestamp {
                if cell.state.is_known() && cell.state.is_solid() == p.state.is_solid() {
                    verified += 1;
                } else {
                    wrong += 1;
                }
                false
            } else {
                true
            }
        });
        self.verified += verified as u64;
        self.wrong += wrong as u64;
        (verified, wrong)
    }

    /// Confidence of the `d`-th extrapolated cell (1-based).
    fn falloff(&self, base: f32, d: usize) -> f32 {
        let max = self.config.max_extrapolation.max(1) as f32;
        base * (1.0 - (d as f32 - 1.0) / max)
    }

    fn wall_continuation(&self, grid: &OccupancyGrid, out: &mut Proposals) {
        for cell in grid.cells().iter().filter(|c| c.is_observed() && c.state.is_solid()) {
            let origin = cell.coord();
            for (dx, dy) in DIRS4 {
                if !observed_solid(grid, origin.offset(-dx, -dy)) {
                    continue;
                }
                for d in 1..=self.config.max_extrapolation {
                    let t = origin.offset(dx * d as i32, dy * d as i32);
                    if !is_target(grid, t) {
                        break;
                    }
                    out.propose(
                        t,
                        CellState::Wall,
                        self.falloff(self.config.wall_confidence, d),
                        Heuristic::WallContinuation,
                    );
                }
            }
        }
    }

    /// Scan rows (`horizontal`) or columns for flanked passable runs.
    fn corridors(&self, grid: &OccupancyGrid, out: &mut Proposals, horizontal: bool) {
        let (along_len, across_len) = if horizontal {
            (grid.width() as i32, grid.height() as i32)
        } else {
            (grid.height() as i32, grid.width() as i32)
        };
        // (position along the run, row/column index) → grid coordinate
        let at = |i: i32, j: i32| {
            if horizontal {
                GridCoord::new(i, j)
            } else {
                GridCoord::new(j, i)
            }
        };
        let is_corridor = |i: i32, j: i32| {
            observed_passable(grid, at(i, j))
                && observed_solid(grid, at(i, j - 1))
                && observed_solid(grid, at(i, j + 1))
        };

        for j in 0..across_len {
            let mut i = 0;
            while i < along_len {
                if !is_corridor(i, j) {
                    i += 1;
                    continue;
                }
                let start = i;
                while i < along_len && is_corridor(i, j) {
                    i += 1;
                }
                if ((i - start) as usize) < self.config.min_corridor_length {
                    continue;
                }
                for (end, step) in [(start - 1, -1), (i, 1)] {
                    for d in 1..=self.config.max_extrapolation {
                        let pos = end + step * (d as i32 - 1);
                        let centre = at(pos, j);
                        if !is_target(grid, centre) {
                            break;
                        }
                        let conf = self.falloff(self.config.corridor_confidence, d);
                        out.propose(centre, CellState::Free, conf, Heuristic::Corridor);
                        for flank in [at(pos, j - 1), at(pos, j + 1)] {
                            if is_target(grid, flank) {
                                out.propose(flank, CellState::Wall, conf, Heuristic::Corridor);
                            }
                        }
                    }
                }
            }
        }
    }

    fn open_space(&self, grid: &OccupancyGrid, out: &mut Proposals) {
        for cell in grid.cells().iter().filter(|c| c.is_observed() && c.state.is_passable()) {
            let origin = cell.coord();
            let passable = DIRS4
                .iter()
                .filter(|(dx, dy)| observed_passable(grid, origin.offset(*dx, *dy)))
                .count();
            if passable < 2 {
                continue;
            }
            for (dx, dy) in DIRS4 {
                let n = origin.offset(dx, dy);
                if is_target(grid, n) {
                    out.propose(
                        n,
                        CellState::Free,
                        self.config.open_space_confidence,
                        Heuristic::OpenSpace,
                    );
                }
            }
        }
    }

    fn boundary_walls(&self, grid: &OccupancyGrid, out: &mut Proposals) {
        let (w, h) = (grid.width() as i32, grid.height() as i32);
        let edge: Vec<GridCoord> = (0..h)
            .flat_map(|gy| (0..w).map(move |gx| GridCoord::new(gx, gy)))
            .filter(|c| c.gx == 0 || c.gy == 0 || c.gx == w - 1 || c.gy == h - 1)
            .collect();
        let walls = edge
            .iter()
            .filter(|&&c| {
                let cell = grid.cell(c);
                is_source(cell) && cell.is_some_and(|c| c.state == CellState::Wall)
            })
            .count();
        if walls <= self.config.boundary_min_walls {
            return;
        }
        for c in edge {
            if is_target(grid, c) {
                out.propose(
                    c,
                    CellState::Wall,
                    self.config.boundary_confidence,
                    Heuristic::BoundaryWall,
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn observe(grid: &mut OccupancyGrid, cells: &[(i32, i32)], state: CellState) {
        for &(x, y) in cells {
            grid.observe(GridCoord::new(x, y), state, 0.95, 1);
        }
    }

    fn state(grid: &OccupancyGrid, x: i32, y: i32) -> CellState {
        grid.cell(GridCoord::new(x, y)).unwrap().state
    }

    #[test]
    fn wall_runs_extend_in_both_directions() {
        let mut grid = OccupancyGrid::new(20, 20, 10.0);
        observe(&mut grid, &[(5, 5), (6, 5)], CellState::Wall);
        let mut p = SpatialPredictor::new(PredictorConfig::default());
        p.run_pass(&mut grid, 10);

        for x in [7, 8, 9, 2, 3, 4] {
            assert_eq!(state(&grid, x, 5), CellState::Wall, "x={x}");
        }
        assert_eq!(state(&grid, 10, 5), CellState::Unknown);
        let c7 = grid.cell(GridCoord::new(7, 5)).unwrap().confidence;
        let c9 = grid.cell(GridCoord::new(9, 5)).unwrap().confidence;
        assert!(c7 > c9);
        assert_eq!(
            p.prediction_at(GridCoord::new(7, 5)).unwrap().source,
            Heuristic::WallContinuation
        );
    }

    #[test]
    fn extrapolation_stops_at_observed_cell() {
        let mut grid = OccupancyGrid::new(20, 20, 10.0);
        observe(&mut grid, &[(5, 5), (6, 5)], CellState::Wall);
        observe(&mut grid, &[(8, 5)], CellState::Free);
        let mut p = SpatialPredictor::new(PredictorConfig::default());
        p.run_pass(&mut grid, 10);
        assert_eq!(state(&grid, 7, 5), CellState::Wall);
        assert_eq!(state(&grid, 8, 5), CellState::Free);
        assert_eq!(state(&grid, 9, 5), CellState::Unknown);
    }

    #[test]
    fn predictions_leave_timestamps_untouched() {
        let mut grid = OccupancyGrid::new(20, 20, 10.0);
        observe(&mut grid, &[(5, 5), (6, 5)], CellState::Wall);
        SpatialPredictor::new(PredictorConfig::default()).run_pass(&mut grid, 10);
        let cell = grid.cell(GridCoord::new(7, 5)).unwrap();
        assert_eq!(cell.last_update, 0);
        assert_eq!(cell.visit_count, 0);
    }

    #[test]
    fn corridor_is_extended_past_its_ends() {
        let mut grid = OccupancyGrid::new(20, 20, 10.0);
        let xs: Vec<i32> = (5..10).collect();
        let row = |y: i32| xs.iter().map(|&x| (x, y)).collect::<Vec<_>>();
        observe(&mut grid, &row(4), CellState::Wall);
        observe(&mut grid, &row(6), CellState::Wall);
        observe(&mut grid, &row(5), CellState::Free);

        let mut p = SpatialPredictor::new(PredictorConfig::default());
        p.run_pass(&mut grid, 10);

        assert_eq!(state(&grid, 4, 5), CellState::Free);
        assert_eq!(state(&grid, 2, 5), CellState::Free);
        assert_eq!(state(&grid, 10, 5), CellState::Free);
        assert_eq!(state(&grid, 12, 5), CellState::Free);
        assert_eq!(state(&grid, 13, 5), CellState::Unknown);
        assert_eq!(
            p.prediction_at(GridCoord::new(4, 5)).unwrap().source,
            Heuristic::Corridor
        );
        assert_eq!(state(&grid, 11, 4), CellState::Wall);
        assert_eq!(state(&grid, 11, 6), CellState::Wall);
    }

    #[test]
    fn short_flanked_run_is_not_a_corridor() {
        let mut grid = OccupancyGrid::new(20, 20, 10.0);
        observe(&mut grid, &[(5, 4), (5, 6)], CellState::Obstacle);
        observe(&mut grid, &[(5, 5)], CellState::Free);
        SpatialPredictor::new(PredictorConfig::default()).run_pass(&mut grid, 10);
        assert_eq!(state(&grid, 4, 5), CellState::Unknown);
        assert_eq!(state(&grid, 6, 5), CellState::Unknown);
    }

    #[test]
    fn open_space_expands_into_unknown() {
        let mut grid = OccupancyGrid::new(20, 20, 10.0);
        let block: Vec<(i32, i32)> = (9..12).flat_map(|x| (9..12).map(move |y| (x, y))).collect();
        observe(&mut grid, &block, CellState::Free);
        let mut p = SpatialPredictor::new(PredictorConfig::default());
        p.run_pass(&mut grid, 10);

        let cell = grid.cell(GridCoord::new(8, 10)).unwrap();
        assert_eq!(cell.state, CellState::Free);
        assert!((cell.confidence - 0.3).abs() < 1e-6);
        assert_eq!(state(&grid, 10, 12), CellState::Free);
        // Diagonal corners are not 4-neighbours of any block cell.
        assert_eq!(state(&grid, 8, 8), CellState::Unknown);
    }

    #[test]
    fn boundary_ring_predicted_after_enough_edge_walls() {
        let mut grid = OccupancyGrid::new(10, 10, 10.0);
        observe(&mut grid, &[(0, 0), (0, 1), (0, 2), (0, 3), (0, 4)], CellState::Wall);
        let mut p = SpatialPredictor::new(PredictorConfig::default());
        p.run_pass(&mut grid, 10);
        assert_eq!(state(&grid, 9, 9), CellState::Wall);
        assert_eq!(state(&grid, 5, 0), CellState::Wall);
        assert_eq!(state(&grid, 5, 5), CellState::Unknown);
        assert_eq!(
            p.prediction_at(GridCoord::new(9, 9)).unwrap().source,
            Heuristic::BoundaryWall
        );
    }

    #[test]
    fn few_edge_walls_do_not_trigger_boundary() {
        let mut grid = OccupancyGrid::new(10, 10, 10.0);
        observe(&mut grid, &[(0, 0), (5, 9)], CellState::Wall);
        SpatialPredictor::new(PredictorConfig::default()).run_pass(&mut grid, 10);
        assert_eq!(state(&grid, 9, 9), CellState::Unknown);
    }

    #[test]
    fn verification_scores_and_removes_predictions() {
        let mut grid = OccupancyGrid::new(20, 20, 10.0);
        observe(&mut grid, &[(5, 5), (6, 5)], CellState::Wall);
        let mut p = SpatialPredictor::new(PredictorConfig::default());
        p.run_pass(&mut grid, 10);
        assert_eq!(p.stats().accuracy, 1.0);

        grid.observe(GridCoord::new(7, 5), CellState::Wall, 0.95, 200);
        grid.observe(GridCoord::new(8, 5), CellState::Explored, 0.9, 200);
        let report = p.run_pass(&mut grid, 300);

        assert_eq!(report.verified, 1);
        assert_eq!(report.wrong, 1);
        let stats = p.stats();
        assert_eq!(stats.verified, 1);
        assert_eq!(stats.wrong, 1);
        assert!((stats.accuracy - 0.5).abs() < 1e-6);
        assert!(p.prediction_at(GridCoord::new(7, 5)).is_none());
    }

    #[test]
    fn free_reading_overrides_and_scores_predicted_wall() {
        let mut grid = OccupancyGrid::new(20, 20, 10.0);
        observe(&mut grid, &[(5, 5), (6, 5)], CellState::Wall);
        let mut p = SpatialPredictor::new(PredictorConfig::default());
        p.run_pass(&mut grid, 10);
        assert_eq!(state(&grid, 7, 5), CellState::Wall);

        assert!(grid.observe(GridCoord::new(7, 5), CellState::Free, 0.8, 200));
        assert_eq!(state(&grid, 7, 5), CellState::Free);

        let report = p.run_pass(&mut grid, 300);
        assert_eq!(report.wrong, 1);
        assert!(p.prediction_at(GridCoord::new(7, 5)).is_none());
        // The observed free cell now stops the wall run.
        assert_eq!(state(&grid, 7, 5), CellState::Free);
    }

    #[test]
    fn stale_observation_does_not_resolve_prediction() {
        let mut grid = OccupancyGrid::new(20, 20, 10.0);
        observe(&mut grid, &[(5, 5), (6, 5)], CellState::Wall);
        let mut p = SpatialPredictor::new(PredictorConfig::default());
        p.run_pass(&mut grid, 10);
        let before = p.stats().prediction_count;
        p.run_pass(&mut grid, 20);
        let stats = p.stats();
        assert_eq!(stats.verified + stats.wrong, 0);
        assert_eq!(stats.prediction_count, before);
    }

    #[test]
    fn reset_clears_registry() {
        let mut grid = OccupancyGrid::new(20, 20, 10.0);
        observe(&mut grid, &[(5, 5), (6, 5)], CellState::Wall);
        let mut p = SpatialPredictor::new(PredictorConfig::default());
        p.run_pass(&mut grid, 10);
        assert!(p.stats().prediction_count > 0);
        p.reset();
        assert_eq!(p.stats().prediction_count, 0);
        assert_eq!(p.predictions().count(), 0);
    }
}
