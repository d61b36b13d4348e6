//! Coarse text rendering of a grid.
//!
//! The grid is downsampled in `block × block` blocks, each block taking the
//! highest-priority state it contains, and rendered north-up (highest `gy`
//! first) with one glyph per block.

use std::f32::consts::{FRAC_PI_4, PI};

use atlas_types::{CellState, GridCoord, GridGeometry, OccupancyView, Pose, WorldPoint};

/// Legend line appended to every rendering.
pub const LEGEND: &str =
    "Legend: # wall, o obstacle, . free, , explored, * path, $ collectible, x collected, ? unknown, >^<v robot, G goal";

pub fn glyph(state: CellState) -> char {
    match state {
        CellState::Unknown => '?',
        CellState::Free => '.',
        CellState::Obstacle => 'o',
        CellState::Wall => '#',
        CellState::Explored => ',',
        CellState::Path => '*',
        CellState::Collectible => '$',
        CellState::Collected => 'x',
    }
}

/// Heading glyph for a rotation (radians, counter-clockwise from +X).
pub fn heading_glyph(rotation: f32) -> char {
    let a = rotation.rem_euclid(2.0 * PI);
    if !(FRAC_PI_4..7.0 * FRAC_PI_4).contains(&a) {
        '>'
    } else if a < 3.0 * FRAC_PI_4 {
        '^'
    } else if a < 5.0 * FRAC_PI_4 {
        '<'
    } else {
        'v'
    }
}

/// A downsampled copy of a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CoarseGrid {
    width: usize,
    height: usize,
    block: usize,
    cells: Vec<CellState>,
}

impl CoarseGrid {
    pub fn downsample<V: OccupancyView + ?Sized>(view: &V, block: usize) -> Self {
        let block = block.max(1);
        let width = view.width().div_ceil(block);
        let height = view.height().div_ceil(block);
        let mut cells = vec![CellState::Unknown; width * height];
        for gy in 0..view.height() {
            for gx in 0..view.width() {
                let Some(state) = view.state_at(GridCoord::new(gx as i32, gy as i32)) else {
                    continue;
                };
                let slot = &mut cells[(gy / block) * width + gx / block];
                if state.priority() > slot.priority() {
                    *slot = state;
                }
            }
        }
        Self {
            width,
            height,
            block,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn state_at(&self, cx: usize, cy: usize) -> Option<CellState> {
        (cx < self.width && cy < self.height).then(|| self.cells[cy * self.width + cx])
    }

    /// Block containing the full-resolution cell `coord`.
    fn block_of(&self, coord: GridCoord) -> Option<(usize, usize)> {
        if coord.gx < 0 || coord.gy < 0 {
            return None;
        }
        let (cx, cy) = (coord.gx as usize / self.block, coord.gy as usize / self.block);
        (cx < self.width && cy < self.height).then_some((cx, cy))
    }

    /// Render rows north-up, overlaying the robot and goal.
    pub fn render(&self, robot: Option<(GridCoord, f32)>, goal: Option<GridCoord>) -> String {
        let robot = robot.and_then(|(c, rot)| self.block_of(c).map(|b| (b, heading_glyph(rot))));
        let goal = goal.and_then(|c| self.block_of(c));

        let mut out = String::with_capacity((self.width + 1) * self.height + LEGEND.len());
        for cy in (0..self.height).rev() {
            for cx in 0..self.width {
                let ch = match (robot, goal) {
                    (Some((b, g)), _) if b == (cx, cy) => g,
                    (_, Some(b)) if b == (cx, cy) => 'G',
                    _ => glyph(self.cells[cy * self.width + cx]),
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out.push_str(LEGEND);
        out
    }
}

/// Downsample `grid` and render it with the robot pose and optional goal.
pub fn coarse_text<M>(grid: &M, block: usize, pose: Option<Pose>, goal: Option<WorldPoint>) -> String
where
    M: OccupancyView + GridGeometry,
{
    let coarse = CoarseGrid::downsample(grid, block);
    let robot = pose.map(|p| (grid.world_to_grid(p.position()), p.rotation));
    let goal = goal.map(|g| grid.world_to_grid(g));
    coarse.render(robot, goal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_types::StateGrid;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn blocks_take_highest_priority_state() {
        let mut grid = StateGrid::filled(4, 4, CellState::Free);
        grid.set(GridCoord::new(1, 1), CellState::Wall);
        grid.set(GridCoord::new(2, 0), CellState::Unknown);
        grid.set(GridCoord::new(2, 2), CellState::Collectible);
        grid.set(GridCoord::new(3, 3), CellState::Explored);
        let c = CoarseGrid::downsample(&grid, 2);
        assert_eq!((c.width(), c.height()), (2, 2));
        assert_eq!(c.state_at(0, 0), Some(CellState::Wall));
        assert_eq!(c.state_at(1, 0), Some(CellState::Free));
        assert_eq!(c.state_at(1, 1), Some(CellState::Collectible));
        assert_eq!(c.state_at(0, 1), Some(CellState::Free));
    }

    #[test]
    fn odd_sizes_round_up() {
        let grid = StateGrid::filled(5, 3, CellState::Free);
        let c = CoarseGrid::downsample(&grid, 2);
        assert_eq!((c.width(), c.height()), (3, 2));
    }

    #[test]
    fn heading_quadrants() {
        assert_eq!(heading_glyph(0.0), '>');
        assert_eq!(heading_glyph(FRAC_PI_2), '^');
        assert_eq!(heading_glyph(PI), '<');
        assert_eq!(heading_glyph(-FRAC_PI_2), 'v');
        assert_eq!(heading_glyph(-0.2), '>');
    }

    #[test]
    fn render_is_north_up_with_overlays() {
        let mut grid = StateGrid::filled(4, 4, CellState::Free);
        grid.set(GridCoord::new(0, 3), CellState::Wall);
        let c = CoarseGrid::downsample(&grid, 2);
        let text = c.render(Some((GridCoord::new(3, 0), FRAC_PI_2)), Some(GridCoord::new(3, 3)));
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows[0], "#G");
        assert_eq!(rows[1], ".^");
        assert!(rows[2].starts_with("Legend:"));
    }
}
