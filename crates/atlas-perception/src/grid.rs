//! Occupancy Grid.
//!
//! A fixed-size, row-major 2-D array of [`GridCell`]s with a linear mapping
//! between world coordinates (metres, centred on the grid) and integer grid
//! coordinates.  All mutation funnels through [`OccupancyGrid::observe`],
//! the single authority for the cell update rule.
//!
//! # Update rule
//!
//! | current     | incoming           | outcome                                 |
//! |-------------|--------------------|-----------------------------------------|
//! | `explored`  | `free`             | ignored                                 |
//! | `wall`      | `free`             | ignored                                 |
//! | `wall`      | `obstacle`         | wall kept, confidence raised            |
//! | `obstacle`  | `wall`             | upgraded to wall                        |
//! | any         | `obstacle`/`wall`/`explored` | applied                       |
//! | any         | other              | applied when confidence ≥ current       |
//!
//! # Example
//!
//! ```rust
//! use atlas_perception::grid::OccupancyGrid;
//! use atlas_types::{CellState, GridCoord, GridGeometry, WorldPoint};
//!
//! let mut grid = OccupancyGrid::new(50, 50, 10.0);
//! let c = grid.world_to_grid(WorldPoint::new(0.0, 0.0));
//! assert_eq!(c, GridCoord::new(25, 25));
//!
//! grid.observe(c, CellState::Wall, 0.95, 10);
//! // A later "free" reading never erases a wall.
//! grid.observe(c, CellState::Free, 1.0, 20);
//! assert_eq!(grid.cell(c).unwrap().state, CellState::Wall);
//! ```

use atlas_types::{CellState, GridCoord, GridGeometry, OccupancyView, Timestamp, WorldPoint};
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// GridCell
// ────────────────────────────────────────────────────────────────────────────

/// The atomic unit of the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub gx: i32,
    pub gy: i32,
    pub state: CellState,
    /// Belief strength in `state`, in `[0, 1]`.
    pub confidence: f32,
    /// Timestamp of the last applied observation (`0` = never).
    pub last_update: Timestamp,
    /// Number of applied direct observations.
    pub visit_count: u32,
    /// Raw distance reading (cm) that last marked this cell as an obstacle.
    pub last_distance_cm: Option<f32>,
}

impl GridCell {
    fn new(gx: i32, gy: i32) -> Self {
        Self {
            gx,
            gy,
            state: CellState::Unknown,
            confidence: 0.0,
            last_update: 0,
            visit_count: 0,
            last_distance_cm: None,
        }
    }

    /// True once at least one direct observation has been applied.
    ///
    /// Predicted and fleet-distributed cells carry a state but are not
    /// observed.
    pub fn is_observed(&self) -> bool {
        self.visit_count > 0
    }

    pub fn coord(&self) -> GridCoord {
        GridCoord::new(self.gx, self.gy)
    }
}

/// Outcome of resolving an incoming observation against a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Ignore,
    /// Keep the current state, raise confidence.
    Reinforce,
    /// Take the incoming state.
    Replace,
}

/// The no-demotion arms only guard cells that were directly observed; a
/// predicted `wall` or `explored` cell can be overwritten like any other.
fn resolve(
    current: CellState,
    current_conf: f32,
    observed: bool,
    incoming: CellState,
    incoming_conf: f32,
) -> Resolution {
    use CellState::*;
    match (current, incoming) {
        (Explored | Wall, Free) if observed => Resolution::Ignore,
        (Wall, Obstacle | Explored) if observed => Resolution::Reinforce,
        (Obstacle, Wall) => Resolution::Replace,
        (_, Obstacle | Wall | Explored) => Resolution::Replace,
        _ if incoming_conf >= current_conf => Resolution::Replace,
        _ => Resolution::Ignore,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OccupancyGrid
// ────────────────────────────────────────────────────────────────────────────

/// Fixed-size probabilistic occupancy grid.
///
/// Dimensions and resolution never change after construction.  World
/// coordinates map onto the grid with the world origin at cell
/// `(width / 2, height / 2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    resolution_cm: f32,
    cells: Vec<GridCell>,
}

impl OccupancyGrid {
    /// Create an all-`unknown` grid of `width × height` cells.
    ///
    /// `resolution_cm` is clamped to at least 0.1 cm.
    pub fn new(width: usize, height: usize, resolution_cm: f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut cells = Vec::with_capacity(width * height);
        for gy in 0..height {
            for gx in 0..width {
                cells.push(GridCell::new(gx as i32, gy as i32));
            }
        }
        Self {
            width,
            height,
            resolution_cm: resolution_cm.max(0.1),
            cells,
        }
    }

    /// Create a grid covering `world_width_m × world_height_m` metres.
    pub fn for_world_size(world_width_m: f32, world_height_m: f32, resolution_cm: f32) -> Self {
        let res = resolution_cm.max(0.1);
        let w = (world_width_m * 100.0 / res).ceil().max(1.0) as usize;
        let h = (world_height_m * 100.0 / res).ceil().max(1.0) as usize;
        Self::new(w, h, res)
    }

    pub fn resolution_cm(&self) -> f32 {
        self.resolution_cm
    }

    pub fn resolution_m(&self) -> f32 {
        self.resolution_cm / 100.0
    }

    /// World extent covered by the grid, in metres.
    pub fn world_size_m(&self) -> (f32, f32) {
        (
            self.width as f32 * self.resolution_m(),
            self.height as f32 * self.resolution_m(),
        )
    }

    /// True when both grids have identical dimensions.
    pub fn same_shape(&self, other: &OccupancyGrid) -> bool {
        self.width == other.width && self.height == other.height
    }

    fn index(&self, coord: GridCoord) -> Option<usize> {
        if self.in_bounds(coord) {
            Some(coord.gy as usize * self.width + coord.gx as usize)
        } else {
            None
        }
    }

    pub fn cell(&self, coord: GridCoord) -> Option<&GridCell> {
        self.index(coord).map(|i| &self.cells[i])
    }

    /// Direct mutable access, bypassing the update rule.
    ///
    /// Reserved for map-to-map operations (fleet merge and distribution)
    /// that apply their own arbitration.
    pub fn cell_mut(&mut self, coord: GridCoord) -> Option<&mut GridCell> {
        self.index(coord).map(|i| &mut self.cells[i])
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [GridCell] {
        &mut self.cells
    }

    /// Apply one observation through the cell update rule.
    ///
    /// Returns `true` when the cell changed.  Out-of-bounds coordinates are
    /// silently ignored.
    pub fn observe(
        &mut self,
        coord: GridCoord,
        state: CellState,
        confidence: f32,
        timestamp: Timestamp,
    ) -> bool {
        let Some(cell) = self.cell_mut(coord) else {
            return false;
        };
        if state == CellState::Unknown {
            return false;
        }
        let confidence = confidence.clamp(0.0, 1.0);
        match resolve(cell.state, cell.confidence, cell.is_observed(), state, confidence) {
            Resolution::Ignore => return false,
            Resolution::Reinforce => {
                cell.confidence = cell.confidence.max(confidence);
            }
            Resolution::Replace => {
                if cell.state == state {
                    cell.confidence = cell.confidence.max(confidence);
                } else {
                    cell.state = state;
                    cell.confidence = confidence;
                }
            }
        }
        cell.last_update = cell.last_update.max(timestamp);
        cell.visit_count = cell.visit_count.saturating_add(1);
        true
    }

    /// Write a predicted state without stamping a timestamp or visit.
    ///
    /// Applied only when the cell is still `unknown` or holds a lower
    /// confidence than the prediction.
    pub fn apply_prediction(&mut self, coord: GridCoord, state: CellState, confidence: f32) -> bool {
        let Some(cell) = self.cell_mut(coord) else {
            return false;
        };
        if cell.state == CellState::Unknown || cell.confidence < confidence {
            cell.state = state;
            cell.confidence = confidence.clamp(0.0, 1.0);
            true
        } else {
            false
        }
    }

    /// Multiply every known cell's confidence by `factor`.
    pub fn decay(&mut self, factor: f32) {
        let factor = factor.clamp(0.0, 1.0);
        for cell in self.cells.iter_mut().filter(|c| c.state.is_known()) {
            cell.confidence *= factor;
        }
    }

    /// Number of cells whose state is not `unknown`.
    pub fn known_count(&self) -> usize {
        self.cells.iter().filter(|c| c.state.is_known()).count()
    }

    /// Fraction of cells whose state is not `unknown`.
    pub fn exploration_fraction(&self) -> f32 {
        self.known_count() as f32 / self.cells.len() as f32
    }

    /// Number of `obstacle` and `wall` cells.
    pub fn obstacle_count(&self) -> usize {
        self.cells.iter().filter(|c| c.state.is_solid()).count()
    }

    /// Row-major list of cell states.
    pub fn flatten(&self) -> Vec<CellState> {
        self.cells.iter().map(|c| c.state).collect()
    }

    /// The in-bounds 8-neighbourhood of `coord`.
    pub fn neighbors8(&self, coord: GridCoord) -> impl Iterator<Item = &GridCell> + '_ {
        const OFFSETS: [(i32, i32); 8] = [
            (-1, -1),
            (0, -1),
            (1, -1),
            (-1, 0),
            (1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        OFFSETS
            .iter()
            .filter_map(move |&(dx, dy)| self.cell(coord.offset(dx, dy)))
    }
}

impl GridGeometry for OccupancyGrid {
    /// Far-away or non-finite points clamp to an out-of-bounds coordinate.
    fn world_to_grid(&self, point: WorldPoint) -> GridCoord {
        let res = self.resolution_m();
        GridCoord::new(
            world_axis_to_cell(point.x, res, self.width),
            world_axis_to_cell(point.y, res, self.height),
        )
    }

    fn grid_to_world(&self, coord: GridCoord) -> WorldPoint {
        let res = self.resolution_m();
        WorldPoint::new(
            (coord.gx as i64 - (self.width / 2) as i64) as f32 * res + res * 0.5,
            (coord.gy as i64 - (self.height / 2) as i64) as f32 * res + res * 0.5,
        )
    }
}

fn world_axis_to_cell(value: f32, res: f32, extent: usize) -> i32 {
    if value.is_nan() {
        return -1;
    }
    // `as` saturates; i64 keeps the centre offset from overflowing.
    let cell = (value / res).floor() as i64 + (extent / 2) as i64;
    cell.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

impl OccupancyView for OccupancyGrid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn state_at(&self, coord: GridCoord) -> Option<CellState> {
        self.cell(coord).map(|c| c.state)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> OccupancyGrid {
        OccupancyGrid::new(10, 10, 10.0)
    }

    #[test]
    fn world_grid_roundtrip_for_every_cell() {
        let g = OccupancyGrid::new(7, 5, 12.5);
        for gy in 0..5 {
            for gx in 0..7 {
                let c = GridCoord::new(gx, gy);
                assert_eq!(g.world_to_grid(g.grid_to_world(c)), c);
            }
        }
    }

    #[test]
    fn negative_world_coordinates_map_below_centre() {
        let g = grid();
        assert_eq!(g.world_to_grid(WorldPoint::new(-0.05, -0.05)), GridCoord::new(4, 4));
        assert_eq!(g.world_to_grid(WorldPoint::new(0.05, 0.05)), GridCoord::new(5, 5));
    }

    #[test]
    fn out_of_range_coordinates_are_not_wrapped() {
        let mut g = grid();
        let far = g.world_to_grid(WorldPoint::new(5.0, 0.0));
        assert!(!g.in_bounds(far));
        assert!(!g.observe(far, CellState::Wall, 1.0, 1));
        assert!(!g.observe(GridCoord::new(-1, 3), CellState::Wall, 1.0, 1));
        assert_eq!(g.known_count(), 0);
    }

    #[test]
    fn wall_is_never_demoted() {
        let mut g = grid();
        let c = GridCoord::new(3, 3);
        g.observe(c, CellState::Wall, 0.5, 1);
        g.observe(c, CellState::Free, 1.0, 2);
        assert_eq!(g.cell(c).unwrap().state, CellState::Wall);
        g.observe(c, CellState::Obstacle, 0.9, 3);
        let cell = g.cell(c).unwrap();
        assert_eq!(cell.state, CellState::Wall);
        assert!((cell.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn observed_wall_absorbs_explored() {
        let mut g = grid();
        let c = GridCoord::new(3, 4);
        g.observe(c, CellState::Wall, 0.5, 1);
        assert!(g.observe(c, CellState::Explored, 0.7, 2));
        let cell = g.cell(c).unwrap();
        assert_eq!(cell.state, CellState::Wall);
        assert!((cell.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn free_ray_clears_predicted_wall() {
        let mut g = grid();
        let c = GridCoord::new(5, 3);
        g.apply_prediction(c, CellState::Wall, 0.33);
        assert!(g.observe(c, CellState::Free, 0.8, 5));
        let cell = g.cell(c).unwrap();
        assert_eq!(cell.state, CellState::Free);
        assert_eq!(cell.last_update, 5);
        assert!(cell.is_observed());
    }

    #[test]
    fn weak_free_ray_does_not_clear_confident_prediction() {
        let mut g = grid();
        let c = GridCoord::new(5, 3);
        g.apply_prediction(c, CellState::Wall, 0.6);
        assert!(!g.observe(c, CellState::Free, 0.4, 5));
        assert_eq!(g.cell(c).unwrap().state, CellState::Wall);
    }

    #[test]
    fn huge_coordinates_land_out_of_bounds() {
        let g = grid();
        for p in [
            WorldPoint::new(3.0e38, 0.0),
            WorldPoint::new(0.0, -3.0e38),
            WorldPoint::new(f32::INFINITY, f32::NEG_INFINITY),
            WorldPoint::new(f32::NAN, 0.0),
        ] {
            assert!(!g.in_bounds(g.world_to_grid(p)), "{p:?}");
        }
    }

    #[test]
    fn obstacle_upgrades_to_wall() {
        let mut g = grid();
        let c = GridCoord::new(1, 1);
        g.observe(c, CellState::Obstacle, 0.9, 1);
        g.observe(c, CellState::Wall, 0.5, 2);
        assert_eq!(g.cell(c).unwrap().state, CellState::Wall);
    }

    #[test]
    fn explored_is_not_demoted_to_free() {
        let mut g = grid();
        let c = GridCoord::new(2, 2);
        g.observe(c, CellState::Explored, 0.3, 1);
        assert!(!g.observe(c, CellState::Free, 0.9, 2));
        assert_eq!(g.cell(c).unwrap().state, CellState::Explored);
    }

    #[test]
    fn weaker_observation_is_ignored() {
        let mut g = grid();
        let c = GridCoord::new(2, 2);
        g.observe(c, CellState::Collectible, 0.8, 1);
        assert!(!g.observe(c, CellState::Free, 0.5, 2));
        assert!(g.observe(c, CellState::Free, 0.8, 3));
        assert_eq!(g.cell(c).unwrap().state, CellState::Free);
    }

    #[test]
    fn direct_contact_overrides_stale_free() {
        let mut g = grid();
        let c = GridCoord::new(4, 4);
        g.observe(c, CellState::Free, 1.0, 1);
        assert!(g.observe(c, CellState::Obstacle, 0.6, 2));
        let cell = g.cell(c).unwrap();
        assert_eq!(cell.state, CellState::Obstacle);
        assert_eq!(cell.last_update, 2);
        assert_eq!(cell.visit_count, 2);
    }

    #[test]
    fn prediction_does_not_touch_timestamp() {
        let mut g = grid();
        let c = GridCoord::new(6, 6);
        assert!(g.apply_prediction(c, CellState::Wall, 0.4));
        let cell = g.cell(c).unwrap();
        assert_eq!(cell.state, CellState::Wall);
        assert_eq!(cell.last_update, 0);
        assert!(!cell.is_observed());
        // Same confidence does not overwrite.
        assert!(!g.apply_prediction(c, CellState::Free, 0.4));
    }

    #[test]
    fn decay_skips_unknown_cells() {
        let mut g = grid();
        let c = GridCoord::new(0, 0);
        g.observe(c, CellState::Free, 1.0, 1);
        g.decay(0.5);
        assert!((g.cell(c).unwrap().confidence - 0.5).abs() < 1e-6);
        assert_eq!(g.cell(GridCoord::new(1, 0)).unwrap().confidence, 0.0);
    }

    #[test]
    fn exploration_and_obstacle_counts() {
        let mut g = grid();
        g.observe(GridCoord::new(0, 0), CellState::Free, 1.0, 1);
        g.observe(GridCoord::new(1, 0), CellState::Wall, 1.0, 1);
        g.observe(GridCoord::new(2, 0), CellState::Obstacle, 1.0, 1);
        assert!((g.exploration_fraction() - 0.03).abs() < 1e-6);
        assert_eq!(g.obstacle_count(), 2);
    }

    #[test]
    fn world_size_rounds_up_to_whole_cells() {
        let g = OccupancyGrid::for_world_size(5.0, 2.05, 10.0);
        assert_eq!(g.width(), 50);
        assert_eq!(g.height(), 21);
    }
}
