//! `atlas-types` – shared vocabulary for the Atlas navigation core.
//!
//! Every other crate in the workspace speaks in these types: the closed
//! [`CellState`] enumeration with its priority and solidity tables, integer
//! [`GridCoord`]s and metric [`WorldPoint`]s, robot [`Pose`]s, exploration
//! [`Frontier`]s, and the two seams that keep components decoupled from the
//! concrete grid:
//!
//! - [`GridGeometry`] – world ↔ grid coordinate conversion.
//! - [`OccupancyView`] – read-only access to cell states.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Milliseconds since an arbitrary caller-chosen epoch.
///
/// `0` means "never observed".
pub type Timestamp = u64;

// ─────────────────────────────────────────────────────────────────────────────
// CellState
// ─────────────────────────────────────────────────────────────────────────────

/// What the map believes occupies a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    /// Never observed.
    #[default]
    Unknown,
    /// Observed traversable space.
    Free,
    /// A transient or sensed obstruction.
    Obstacle,
    /// A confirmed structural wall.
    Wall,
    /// A cell the robot has physically occupied.
    Explored,
    /// A cell on a planned or driven route.
    Path,
    /// An item the robot should pick up.
    Collectible,
    /// A collectible that has been picked up.
    Collected,
}

impl CellState {
    /// All states, in declaration order.
    pub const ALL: [CellState; 8] = [
        CellState::Unknown,
        CellState::Free,
        CellState::Obstacle,
        CellState::Wall,
        CellState::Explored,
        CellState::Path,
        CellState::Collectible,
        CellState::Collected,
    ];

    /// Rank in the state-priority ordering
    /// `wall > obstacle > collectible > collected > explored/path > free > unknown`.
    ///
    /// Higher is more obstructive.
    pub fn priority(self) -> u8 {
        match self {
            CellState::Unknown => 0,
            CellState::Free => 1,
            CellState::Explored | CellState::Path => 2,
            CellState::Collected => 3,
            CellState::Collectible => 4,
            CellState::Obstacle => 5,
            CellState::Wall => 6,
        }
    }

    /// True for states that block motion.
    pub fn is_solid(self) -> bool {
        match self {
            CellState::Obstacle | CellState::Wall => true,
            CellState::Unknown
            | CellState::Free
            | CellState::Explored
            | CellState::Path
            | CellState::Collectible
            | CellState::Collected => false,
        }
    }

    /// True for known states a robot can drive through.
    pub fn is_passable(self) -> bool {
        match self {
            CellState::Free
            | CellState::Explored
            | CellState::Path
            | CellState::Collectible
            | CellState::Collected => true,
            CellState::Unknown | CellState::Obstacle | CellState::Wall => false,
        }
    }

    /// True for any state other than [`CellState::Unknown`].
    pub fn is_known(self) -> bool {
        self != CellState::Unknown
    }

    /// Lower-case name used in text digests.
    pub fn as_str(self) -> &'static str {
        match self {
            CellState::Unknown => "unknown",
            CellState::Free => "free",
            CellState::Obstacle => "obstacle",
            CellState::Wall => "wall",
            CellState::Explored => "explored",
            CellState::Path => "path",
            CellState::Collectible => "collectible",
            CellState::Collected => "collected",
        }
    }
}

impl std::fmt::Display for CellState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinates and poses
// ─────────────────────────────────────────────────────────────────────────────

/// Integer grid address.  May lie outside a grid; consumers bounds-check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub gx: i32,
    pub gy: i32,
}

impl GridCoord {
    pub fn new(gx: i32, gy: i32) -> Self {
        Self { gx, gy }
    }

    /// Return the coordinate shifted by `(dx, dy)`.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.gx.saturating_add(dx), self.gy.saturating_add(dy))
    }
}

/// A point in the world frame, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorldPoint {
    pub x: f32,
    pub y: f32,
}

impl WorldPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`, in metres.
    pub fn distance(self, other: WorldPoint) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// True when both components are finite numbers.
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Robot pose snapshot in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// X position (metres).
    pub x: f32,
    /// Y position (metres).
    pub y: f32,
    /// Heading, counter-clockwise from +X (radians).
    pub rotation: f32,
    pub timestamp: Timestamp,
}

impl Pose {
    pub fn new(x: f32, y: f32, rotation: f32, timestamp: Timestamp) -> Self {
        Self {
            x,
            y,
            rotation,
            timestamp,
        }
    }

    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }
}

/// A candidate exploration target: a known passable cell next to unknown
/// space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontier {
    pub coord: GridCoord,
    /// How many of the cell's 8 neighbours are still unknown.
    pub unknown_neighbors: u8,
}

// ─────────────────────────────────────────────────────────────────────────────
// Seams
// ─────────────────────────────────────────────────────────────────────────────

/// World ↔ grid coordinate conversion.
///
/// Planners and coordinators take this as a capability instead of owning a
/// grid, so they can be driven by synthetic conversions in tests.
pub trait GridGeometry {
    /// Map a world point to the grid cell that contains it.  The result is
    /// not bounds-checked.
    fn world_to_grid(&self, point: WorldPoint) -> GridCoord;

    /// Map a grid cell to the world position of its centre.
    fn grid_to_world(&self, coord: GridCoord) -> WorldPoint;
}

/// Geometry backed by two plain functions or closures.
pub struct FnGeometry<W, G>
where
    W: Fn(WorldPoint) -> GridCoord,
    G: Fn(GridCoord) -> WorldPoint,
{
    to_grid: W,
    to_world: G,
}

impl<W, G> FnGeometry<W, G>
where
    W: Fn(WorldPoint) -> GridCoord,
    G: Fn(GridCoord) -> WorldPoint,
{
    pub fn new(to_grid: W, to_world: G) -> Self {
        Self { to_grid, to_world }
    }
}

impl<W, G> GridGeometry for FnGeometry<W, G>
where
    W: Fn(WorldPoint) -> GridCoord,
    G: Fn(GridCoord) -> WorldPoint,
{
    fn world_to_grid(&self, point: WorldPoint) -> GridCoord {
        (self.to_grid)(point)
    }

    fn grid_to_world(&self, coord: GridCoord) -> WorldPoint {
        (self.to_world)(coord)
    }
}

/// Read-only access to a rectangular grid of [`CellState`]s.
pub trait OccupancyView {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// State at `coord`, or `None` when the coordinate is out of bounds.
    fn state_at(&self, coord: GridCoord) -> Option<CellState>;

    fn in_bounds(&self, coord: GridCoord) -> bool {
        coord.gx >= 0
            && coord.gy >= 0
            && (coord.gx as usize) < self.width()
            && (coord.gy as usize) < self.height()
    }
}

/// A bare row-major grid of states, used by decoders and synthetic tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateGrid {
    width: usize,
    height: usize,
    states: Vec<CellState>,
}

impl StateGrid {
    /// A `width × height` grid filled with `fill`.
    pub fn filled(width: usize, height: usize, fill: CellState) -> Self {
        Self {
            width,
            height,
            states: vec![fill; width * height],
        }
    }

    /// Wrap an existing row-major state vector.
    pub fn from_states(
        width: usize,
        height: usize,
        states: Vec<CellState>,
    ) -> Result<Self, AtlasError> {
        if states.len() != width * height {
            return Err(AtlasError::InvalidInput(format!(
                "expected {} cells for a {width}x{height} grid, got {}",
                width * height,
                states.len()
            )));
        }
        Ok(Self {
            width,
            height,
            states,
        })
    }

    /// Overwrite one cell.  Out-of-bounds writes are ignored.
    pub fn set(&mut self, coord: GridCoord, state: CellState) {
        if self.in_bounds(coord) {
            let idx = coord.gy as usize * self.width + coord.gx as usize;
            self.states[idx] = state;
        }
    }

    pub fn states(&self) -> &[CellState] {
        &self.states
    }
}

impl OccupancyView for StateGrid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn state_at(&self, coord: GridCoord) -> Option<CellState> {
        if !self.in_bounds(coord) {
            return None;
        }
        Some(self.states[coord.gy as usize * self.width + coord.gx as usize])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error
// ─────────────────────────────────────────────────────────────────────────────

/// Shared error type for rejected input across the navigation core.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AtlasError {
    #[error("Coordinate ({gx}, {gy}) is out of bounds")]
    OutOfBounds { gx: i32, gy: i32 },

    #[error("Grid dimension mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_follows_documented_ordering() {
        use CellState::*;
        let ordered = [Wall, Obstacle, Collectible, Collected, Explored, Free, Unknown];
        for pair in ordered.windows(2) {
            assert!(pair[0].priority() > pair[1].priority(), "{:?} vs {:?}", pair[0], pair[1]);
        }
        assert_eq!(Explored.priority(), Path.priority());
    }

    #[test]
    fn solid_and_passable_are_disjoint() {
        for s in CellState::ALL {
            assert!(!(s.is_solid() && s.is_passable()), "{s} is both");
        }
        assert!(!CellState::Unknown.is_solid());
        assert!(!CellState::Unknown.is_passable());
    }

    #[test]
    fn cell_state_serializes_lowercase() {
        let json = serde_json::to_string(&CellState::Collectible).unwrap();
        assert_eq!(json, "\"collectible\"");
        let back: CellState = serde_json::from_str("\"wall\"").unwrap();
        assert_eq!(back, CellState::Wall);
    }

    #[test]
    fn state_grid_ignores_out_of_bounds_writes() {
        let mut g = StateGrid::filled(3, 2, CellState::Free);
        g.set(GridCoord::new(5, 0), CellState::Wall);
        g.set(GridCoord::new(-1, 0), CellState::Wall);
        assert!(g.states().iter().all(|s| *s == CellState::Free));
        g.set(GridCoord::new(2, 1), CellState::Wall);
        assert_eq!(g.state_at(GridCoord::new(2, 1)), Some(CellState::Wall));
        assert_eq!(g.state_at(GridCoord::new(3, 1)), None);
    }

    #[test]
    fn state_grid_rejects_wrong_length() {
        let err = StateGrid::from_states(2, 2, vec![CellState::Free; 3]).unwrap_err();
        assert!(err.to_string().contains("expected 4 cells"));
    }

    #[test]
    fn fn_geometry_delegates_to_closures() {
        let geo = FnGeometry::new(
            |p: WorldPoint| GridCoord::new(p.x as i32, p.y as i32),
            |c: GridCoord| WorldPoint::new(c.gx as f32 + 0.5, c.gy as f32 + 0.5),
        );
        assert_eq!(geo.world_to_grid(WorldPoint::new(2.7, 1.1)), GridCoord::new(2, 1));
        assert_eq!(geo.grid_to_world(GridCoord::new(2, 1)), WorldPoint::new(2.5, 1.5));
    }

    #[test]
    fn atlas_error_display() {
        let err = AtlasError::OutOfBounds { gx: -1, gy: 4 };
        assert!(err.to_string().contains("out of bounds"));
    }
}
