//! Occupancy World Model.
//!
//! Owns one agent's [`OccupancyGrid`] together with the robot pose and a
//! bounded pose history, and turns raw sensor and vision observations into
//! cell updates.
//!
//! # Sensor model
//!
//! [`WorldModel::update_from_sensors`] ray-casts six fixed distance sensors
//! (front, front-left, front-right, left, right, back) from the robot pose.
//! Each ray steps outward one grid resolution at a time:
//!
//! ```text
//! free confidence = 0.8 − 0.4 × (distance travelled / ray length)
//! ```
//!
//! When the raw reading is below the near-threshold (200 cm by default) the
//! ray endpoint is marked `obstacle` at 0.9 and the raw reading is stored on
//! the cell.
//!
//! # Example
//!
//! ```rust
//! use atlas_perception::world_model::{SensorDistances, WorldConfig, WorldModel};
//! use atlas_types::Pose;
//!
//! let mut world = WorldModel::new(WorldConfig::default());
//! world.update_from_sensors(
//!     Pose::new(0.0, 0.0, 0.0, 1_000),
//!     &SensorDistances { front: Some(50.0), ..Default::default() },
//! );
//! assert_eq!(world.grid().obstacle_count(), 1);
//! assert!(world.exploration_fraction() > 0.0);
//! ```

use std::collections::VecDeque;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use atlas_types::{
    CellState, Frontier, GridCoord, GridGeometry, OccupancyView, Pose, Timestamp, WorldPoint,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::OccupancyGrid;

/// Confidence of the robot's own cell after a sensor update.
const ROBOT_CELL_CONFIDENCE: f32 = 1.0;
/// Confidence of a ray endpoint closer than the obstacle threshold.
const SENSOR_OBSTACLE_CONFIDENCE: f32 = 0.9;
/// Confidence of pre-seeded wall cells.
const WALL_SEED_CONFIDENCE: f32 = 0.95;
/// Free-space confidence right next to the robot.
const FREE_CONFIDENCE_NEAR: f32 = 0.8;
/// Free-space confidence at the far end of a ray.
const FREE_CONFIDENCE_FAR: f32 = 0.4;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Construction parameters for a [`WorldModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World extent along X (metres).
    pub world_width_m: f32,
    /// World extent along Y (metres).
    pub world_height_m: f32,
    /// Cell edge length (centimetres).
    pub resolution_cm: f32,
    /// Readings are truncated to this range when ray-casting free space.
    pub max_ray_range_cm: f32,
    /// Readings below this distance mark an obstacle at the ray endpoint.
    pub obstacle_threshold_cm: f32,
    /// Factor applied by [`WorldModel::decay_confidence`].
    pub decay_factor: f32,
    /// Maximum number of poses kept in the path history.
    pub path_history_cap: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_width_m: 5.0,
            world_height_m: 5.0,
            resolution_cm: 10.0,
            max_ray_range_cm: 300.0,
            obstacle_threshold_cm: 200.0,
            decay_factor: 0.995,
            path_history_cap: 500,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Up to six directional distance readings, in centimetres.
///
/// `None` means the sensor produced no reading this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorDistances {
    pub front: Option<f32>,
    pub front_left: Option<f32>,
    pub front_right: Option<f32>,
    pub left: Option<f32>,
    pub right: Option<f32>,
    pub back: Option<f32>,
}

impl SensorDistances {
    /// `(angle offset from heading, reading)` for every sensor.
    fn rays(&self) -> [(f32, Option<f32>); 6] {
        [
            (0.0, self.front),
            (FRAC_PI_4, self.front_left),
            (-FRAC_PI_4, self.front_right),
            (FRAC_PI_2, self.left),
            (-FRAC_PI_2, self.right),
            (PI, self.back),
        ]
    }
}

/// Axis-aligned arena limits in world coordinates (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArenaBounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

/// A straight wall between two world points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    pub start: WorldPoint,
    pub end: WorldPoint,
}

impl WallSegment {
    pub fn new(start: WorldPoint, end: WorldPoint) -> Self {
        Self { start, end }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outputs
// ─────────────────────────────────────────────────────────────────────────────

/// Distance from the robot to the first unknown cell along one heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionProbe {
    /// Compass label (`"E"`, `"NE"`, `"N"`, …).
    pub label: &'static str,
    /// World-frame heading (radians).
    pub angle: f32,
    /// Metres to the first unknown cell; `None` when a solid cell or the
    /// grid edge comes first.
    pub distance_m: Option<f32>,
}

/// Deep copy of a world model at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub grid: OccupancyGrid,
    pub pose: Option<Pose>,
    pub path: Vec<Pose>,
    pub exploration: f32,
    pub obstacle_count: usize,
    pub known_cells: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// WorldModel
// ─────────────────────────────────────────────────────────────────────────────

/// One agent's authoritative map and pose history.
#[derive(Debug, Clone)]
pub struct WorldModel {
    config: WorldConfig,
    grid: OccupancyGrid,
    pose: Option<Pose>,
    path: VecDeque<Pose>,
}

impl WorldModel {
    /// Create an all-`unknown` world sized by `config`.
    pub fn new(config: WorldConfig) -> Self {
        let grid = OccupancyGrid::for_world_size(
            config.world_width_m,
            config.world_height_m,
            config.resolution_cm,
        );
        Self {
            config,
            grid,
            pose: None,
            path: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    /// Mutable grid access for map-to-map operations.
    pub fn grid_mut(&mut self) -> &mut OccupancyGrid {
        &mut self.grid
    }

    /// Most recent robot pose, if any sensor update has arrived.
    pub fn pose(&self) -> Option<Pose> {
        self.pose
    }

    /// Pose history, oldest first.
    pub fn path(&self) -> impl Iterator<Item = &Pose> {
        self.path.iter()
    }

    pub fn world_to_grid(&self, point: WorldPoint) -> GridCoord {
        self.grid.world_to_grid(point)
    }

    pub fn grid_to_world(&self, coord: GridCoord) -> WorldPoint {
        self.grid.grid_to_world(coord)
    }

    // ── Seeding ─────────────────────────────────────────────────────────────

    /// Mark the four edges of `bounds` as walls.  Returns the number of cells
    /// changed.
    pub fn initialize_boundaries(&mut self, bounds: ArenaBounds, timestamp: Timestamp) -> usize {
        let corners = [
            WorldPoint::new(bounds.min_x, bounds.min_y),
            WorldPoint::new(bounds.max_x, bounds.min_y),
            WorldPoint::new(bounds.max_x, bounds.max_y),
            WorldPoint::new(bounds.min_x, bounds.max_y),
        ];
        let segments: Vec<WallSegment> = (0..4)
            .map(|i| WallSegment::new(corners[i], corners[(i + 1) % 4]))
            .collect();
        self.initialize_walls_from_runs(&segments, timestamp)
    }

    /// Rasterize each segment into `wall` cells at 0.95 confidence.
    ///
    /// Segments are walked in half-cell steps; at every step the cell under
    /// the point and the cells half a cell to either side (perpendicular to
    /// the segment) are marked.  Returns the number of cells changed.
    pub fn initialize_walls_from_runs(
        &mut self,
        segments: &[WallSegment],
        timestamp: Timestamp,
    ) -> usize {
        let step = self.grid.resolution_m() * 0.5;
        let mut changed = 0;
        for seg in segments {
            let length = seg.start.distance(seg.end);
            let (dx, dy) = if length > f32::EPSILON {
                ((seg.end.x - seg.start.x) / length, (seg.end.y - seg.start.y) / length)
            } else {
                (0.0, 0.0)
            };
            let (px, py) = (-dy, dx);
            let steps = (length / step).ceil() as usize;
            for i in 0..=steps {
                let t = (i as f32 * step).min(length);
                let base = WorldPoint::new(seg.start.x + dx * t, seg.start.y + dy * t);
                for offset in [0.0, step, -step] {
                    let p = WorldPoint::new(base.x + px * offset, base.y + py * offset);
                    let coord = self.grid.world_to_grid(p);
                    if self
                        .grid
                        .observe(coord, CellState::Wall, WALL_SEED_CONFIDENCE, timestamp)
                    {
                        changed += 1;
                    }
                }
            }
        }
        debug!(segments = segments.len(), changed, "seeded wall segments");
        changed
    }

    // ── Observation ─────────────────────────────────────────────────────────

    /// Ingest one pose and its six directional distance readings.
    pub fn update_from_sensors(&mut self, pose: Pose, distances: &SensorDistances) {
        self.push_pose(pose);
        let origin = pose.position();
        let robot_cell = self.grid.world_to_grid(origin);
        self.grid.observe(
            robot_cell,
            CellState::Explored,
            ROBOT_CELL_CONFIDENCE,
            pose.timestamp,
        );

        let threshold = self.config.obstacle_threshold_cm;
        for (offset, reading) in distances.rays() {
            let Some(reading_cm) = reading else { continue };
            if !reading_cm.is_finite() || reading_cm < 0.0 {
                continue;
            }
            let endpoint = (reading_cm < threshold)
                .then_some((CellState::Obstacle, SENSOR_OBSTACLE_CONFIDENCE));
            let hit = self.cast_ray(
                origin,
                pose.rotation + offset,
                reading_cm,
                FREE_CONFIDENCE_NEAR,
                endpoint,
                pose.timestamp,
            );
            if let Some(coord) = hit
                && let Some(cell) = self.grid.cell_mut(coord)
            {
                cell.last_distance_cm = Some(reading_cm);
            }
        }
        debug!(
            x = pose.x,
            y = pose.y,
            exploration = self.exploration_fraction(),
            "sensor update applied"
        );
    }

    /// Write a single cell observed by the vision pipeline.
    pub fn update_cell_from_vision(
        &mut self,
        point: WorldPoint,
        state: CellState,
        confidence: f32,
        timestamp: Timestamp,
    ) -> bool {
        let coord = self.grid.world_to_grid(point);
        self.grid.observe(coord, state, confidence, timestamp)
    }

    /// Ray-cast a vision detection: free space up to `distance_m`, then
    /// `endpoint_state` at the far end.
    ///
    /// Free-space confidence scales with `confidence` and falls off with
    /// distance the same way as the range sensors.
    pub fn update_ray_from_vision(
        &mut self,
        origin: WorldPoint,
        angle: f32,
        distance_m: f32,
        endpoint_state: CellState,
        confidence: f32,
        timestamp: Timestamp,
    ) {
        if !distance_m.is_finite() || distance_m < 0.0 {
            return;
        }
        let near = FREE_CONFIDENCE_NEAR * confidence.clamp(0.0, 1.0);
        let endpoint = match endpoint_state {
            CellState::Unknown => None,
            s => Some((s, confidence)),
        };
        self.cast_ray(origin, angle, distance_m * 100.0, near, endpoint, timestamp);
    }

    /// Stamp cells of a driven route as `path`.
    pub fn mark_path(&mut self, cells: &[GridCoord], timestamp: Timestamp) -> usize {
        cells
            .iter()
            .filter(|&&c| self.grid.observe(c, CellState::Path, 1.0, timestamp))
            .count()
    }

    /// Record a collectible item seen at `point`.
    pub fn mark_collectible(&mut self, point: WorldPoint, confidence: f32, timestamp: Timestamp) -> bool {
        self.update_cell_from_vision(point, CellState::Collectible, confidence, timestamp)
    }

    /// Record that the collectible at `point` has been picked up.
    pub fn mark_collected(&mut self, point: WorldPoint, timestamp: Timestamp) -> bool {
        self.update_cell_from_vision(point, CellState::Collected, 1.0, timestamp)
    }

    /// Apply the configured decay factor to every known cell.
    pub fn decay_confidence(&mut self) {
        self.grid.decay(self.config.decay_factor);
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn exploration_fraction(&self) -> f32 {
        self.grid.exploration_fraction()
    }

    pub fn obstacle_count(&self) -> usize {
        self.grid.obstacle_count()
    }

    /// Metres from the robot to the first `unknown` cell along `angle`.
    ///
    /// Returns `None` when a solid cell or the grid edge is reached first.
    /// Without a pose the probe starts at the world origin.
    pub fn distance_to_unknown(&self, angle: f32) -> Option<f32> {
        let origin = self.pose.map(|p| p.position()).unwrap_or_default();
        let step = self.grid.resolution_m();
        let (dx, dy) = (angle.cos(), angle.sin());
        let max_steps = self.grid.width() + self.grid.height();
        for i in 1..=max_steps {
            let d = i as f32 * step;
            let coord = self
                .grid
                .world_to_grid(WorldPoint::new(origin.x + dx * d, origin.y + dy * d));
            match self.grid.state_at(coord)? {
                CellState::Unknown => return Some(d),
                s if s.is_solid() => return None,
                _ => {}
            }
        }
        None
    }

    /// [`distance_to_unknown`][Self::distance_to_unknown] in the eight
    /// compass directions, starting east and turning counter-clockwise.
    pub fn exploration_probes(&self) -> [DirectionProbe; 8] {
        const LABELS: [&str; 8] = ["E", "NE", "N", "NW", "W", "SW", "S", "SE"];
        std::array::from_fn(|i| {
            let angle = i as f32 * FRAC_PI_4;
            DirectionProbe {
                label: LABELS[i],
                angle,
                distance_m: self.distance_to_unknown(angle),
            }
        })
    }

    /// Known passable cells with at least one `unknown` 8-neighbour.
    pub fn find_frontiers(&self) -> Vec<Frontier> {
        self.grid
            .cells()
            .iter()
            .filter(|c| c.state.is_passable())
            .filter_map(|c| {
                let unknown = self
                    .grid
                    .neighbors8(c.coord())
                    .filter(|n| n.state == CellState::Unknown)
                    .count() as u8;
                (unknown > 0).then_some(Frontier {
                    coord: c.coord(),
                    unknown_neighbors: unknown,
                })
            })
            .collect()
    }

    /// Deep copy of the grid, pose history and aggregate counters.
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            grid: self.grid.clone(),
            pose: self.pose,
            path: self.path.iter().copied().collect(),
            exploration: self.exploration_fraction(),
            obstacle_count: self.obstacle_count(),
            known_cells: self.grid.known_count(),
        }
    }

    /// Multi-line digest for a downstream decision consumer.
    pub fn summary_text(&self) -> String {
        let mut out = format!(
            "Grid {}x{} @ {}cm | explored {:.1}% | obstacles {}\n",
            self.grid.width(),
            self.grid.height(),
            self.grid.resolution_cm(),
            self.exploration_fraction() * 100.0,
            self.obstacle_count(),
        );
        match self.pose {
            Some(p) => out.push_str(&format!(
                "Robot at ({:.2}, {:.2}) heading {}°\n",
                p.x,
                p.y,
                p.rotation.to_degrees().round() as i32
            )),
            None => out.push_str("Robot pose unknown\n"),
        }
        let probes: Vec<String> = self
            .exploration_probes()
            .iter()
            .map(|p| match p.distance_m {
                Some(d) => format!("{} {:.1}m", p.label, d),
                None => format!("{} -", p.label),
            })
            .collect();
        out.push_str(&format!("Unknown space: {}\n", probes.join(", ")));
        out.push_str(&format!("Frontiers: {}", self.find_frontiers().len()));
        out
    }

    /// One-line digest.
    pub fn compact_summary(&self) -> String {
        let pose = match self.pose {
            Some(p) => format!(
                "({:.2},{:.2},{}°)",
                p.x,
                p.y,
                p.rotation.to_degrees().round() as i32
            ),
            None => "?".to_string(),
        };
        format!(
            "explored={:.1}% obstacles={} pose={}",
            self.exploration_fraction() * 100.0,
            self.obstacle_count(),
            pose
        )
    }

    // ── Internals ───────────────────────────────────────────────────────────

    fn push_pose(&mut self, pose: Pose) {
        self.pose = Some(pose);
        self.path.push_back(pose);
        while self.path.len() > self.config.path_history_cap.max(1) {
            self.path.pop_front();
        }
    }

    /// Step along a ray marking free cells, then optionally mark the
    /// endpoint.  Returns the endpoint cell when one was marked.
    fn cast_ray(
        &mut self,
        origin: WorldPoint,
        angle: f32,
        reading_cm: f32,
        near_confidence: f32,
        endpoint: Option<(CellState, f32)>,
        timestamp: Timestamp,
    ) -> Option<GridCoord> {
        let (dx, dy) = (angle.cos(), angle.sin());
        let origin_cell = self.grid.world_to_grid(origin);
        let range_cm = reading_cm.min(self.config.max_ray_range_cm);
        let step_cm = self.grid.resolution_cm();
        let end_cell = endpoint.map(|_| {
            let d = reading_cm / 100.0;
            self.grid
                .world_to_grid(WorldPoint::new(origin.x + dx * d, origin.y + dy * d))
        });

        if range_cm > 0.0 {
            let steps = (range_cm / step_cm).floor() as usize;
            let far_ratio = FREE_CONFIDENCE_FAR / FREE_CONFIDENCE_NEAR;
            for i in 1..=steps {
                let d_cm = i as f32 * step_cm;
                let coord = self.grid.world_to_grid(WorldPoint::new(
                    origin.x + dx * d_cm / 100.0,
                    origin.y + dy * d_cm / 100.0,
                ));
                if Some(coord) == end_cell {
                    break;
                }
                let fraction = d_cm / range_cm;
                let confidence = near_confidence * (1.0 - (1.0 - far_ratio) * fraction);
                self.grid.observe(coord, CellState::Free, confidence, timestamp);
            }
        }

        let (state, confidence) = endpoint?;
        let end = end_cell?;
        if end == origin_cell {
            return None;
        }
        self.grid.observe(end, state, confidence, timestamp);
        Some(end)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> WorldModel {
        WorldModel::new(WorldConfig::default())
    }

    #[test]
    fn sensor_update_marks_robot_cell_explored() {
        let mut w = world();
        w.update_from_sensors(Pose::new(0.0, 0.0, 0.0, 10), &SensorDistances::default());
        let c = w.world_to_grid(WorldPoint::new(0.0, 0.0));
        let cell = w.grid().cell(c).unwrap();
        assert_eq!(cell.state, CellState::Explored);
        assert_eq!(cell.confidence, 1.0);
        assert_eq!(cell.last_update, 10);
    }

    #[test]
    fn near_reading_marks_obstacle_and_stores_distance() {
        let mut w = world();
        w.update_from_sensors(
            Pose::new(0.0, 0.0, 0.0, 10),
            &SensorDistances {
                front: Some(55.0),
                ..Default::default()
            },
        );
        let end = w.world_to_grid(WorldPoint::new(0.55, 0.0));
        let cell = w.grid().cell(end).unwrap();
        assert_eq!(cell.state, CellState::Obstacle);
        assert!((cell.confidence - 0.9).abs() < 1e-6);
        assert_eq!(cell.last_distance_cm, Some(55.0));

        let mid = w.world_to_grid(WorldPoint::new(0.25, 0.0));
        assert_eq!(w.grid().cell(mid).unwrap().state, CellState::Free);
    }

    #[test]
    fn free_confidence_falls_with_distance() {
        let mut w = world();
        w.update_from_sensors(
            Pose::new(0.0, 0.0, 0.0, 10),
            &SensorDistances {
                front: Some(250.0),
                ..Default::default()
            },
        );
        let near = w.world_to_grid(WorldPoint::new(0.15, 0.0));
        let far = w.world_to_grid(WorldPoint::new(2.05, 0.0));
        let near_conf = w.grid().cell(near).unwrap().confidence;
        let far_conf = w.grid().cell(far).unwrap().confidence;
        assert!(near_conf > far_conf, "{near_conf} <= {far_conf}");
        assert_eq!(w.obstacle_count(), 0, "readings beyond 200cm mark no obstacle");
    }

    #[test]
    fn rays_follow_heading() {
        let mut w = world();
        // Facing +Y: the "right" sensor looks toward +X.
        w.update_from_sensors(
            Pose::new(0.0, 0.0, FRAC_PI_2, 10),
            &SensorDistances {
                right: Some(40.0),
                ..Default::default()
            },
        );
        let end = w.world_to_grid(WorldPoint::new(0.40, 0.0));
        assert_eq!(w.grid().cell(end).unwrap().state, CellState::Obstacle);
    }

    #[test]
    fn rays_leaving_the_grid_do_not_panic() {
        let mut w = world();
        w.update_from_sensors(
            Pose::new(2.4, 2.4, FRAC_PI_4, 10),
            &SensorDistances {
                front: Some(150.0),
                back: Some(f32::NAN),
                ..Default::default()
            },
        );
        assert!(w.exploration_fraction() > 0.0);
    }

    #[test]
    fn path_history_is_capped() {
        let mut w = WorldModel::new(WorldConfig {
            path_history_cap: 3,
            ..Default::default()
        });
        for t in 0..5 {
            w.update_from_sensors(Pose::new(0.0, 0.0, 0.0, t), &SensorDistances::default());
        }
        let stamps: Vec<u64> = w.path().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![2, 3, 4]);
    }

    #[test]
    fn boundaries_seed_walls_on_every_edge() {
        let mut w = world();
        let changed = w.initialize_boundaries(
            ArenaBounds {
                min_x: -2.0,
                min_y: -2.0,
                max_x: 2.0,
                max_y: 2.0,
            },
            1,
        );
        assert!(changed >= 4 * 40);
        for p in [
            WorldPoint::new(-2.0, 0.0),
            WorldPoint::new(2.0, 0.5),
            WorldPoint::new(0.3, -2.0),
            WorldPoint::new(-1.0, 2.0),
        ] {
            let cell = w.grid().cell(w.world_to_grid(p)).unwrap();
            assert_eq!(cell.state, CellState::Wall, "at {p:?}");
            assert!((cell.confidence - 0.95).abs() < 1e-6);
        }
        // Interior untouched.
        let centre = w.world_to_grid(WorldPoint::new(0.0, 0.0));
        assert_eq!(w.grid().cell(centre).unwrap().state, CellState::Unknown);
    }

    #[test]
    fn vision_ray_marks_endpoint_state() {
        let mut w = world();
        w.update_ray_from_vision(
            WorldPoint::new(0.0, 0.0),
            0.0,
            0.8,
            CellState::Collectible,
            0.7,
            5,
        );
        let end = w.world_to_grid(WorldPoint::new(0.8, 0.0));
        assert_eq!(w.grid().cell(end).unwrap().state, CellState::Collectible);
        let mid = w.world_to_grid(WorldPoint::new(0.35, 0.0));
        assert_eq!(w.grid().cell(mid).unwrap().state, CellState::Free);
    }

    #[test]
    fn collectible_lifecycle() {
        let mut w = world();
        let p = WorldPoint::new(1.0, 1.0);
        assert!(w.mark_collectible(p, 0.8, 1));
        assert!(w.mark_collected(p, 2));
        let cell = w.grid().cell(w.world_to_grid(p)).unwrap();
        assert_eq!(cell.state, CellState::Collected);
    }

    #[test]
    fn probe_stops_at_walls_and_finds_unknown() {
        let mut w = world();
        w.update_from_sensors(
            Pose::new(0.0, 0.0, 0.0, 1),
            &SensorDistances {
                front: Some(50.0),
                back: Some(150.0),
                ..Default::default()
            },
        );
        assert_eq!(w.distance_to_unknown(0.0), None, "obstacle ahead");
        let behind = w.distance_to_unknown(PI).expect("unknown behind the free ray");
        assert!(behind > 1.0);
    }

    #[test]
    fn frontiers_border_unknown_space() {
        let mut w = world();
        w.update_from_sensors(Pose::new(0.0, 0.0, 0.0, 1), &SensorDistances::default());
        let frontiers = w.find_frontiers();
        assert_eq!(frontiers.len(), 1);
        assert_eq!(frontiers[0].unknown_neighbors, 8);
    }

    #[test]
    fn snapshot_is_detached_from_live_grid() {
        let mut w = world();
        w.update_from_sensors(Pose::new(0.0, 0.0, 0.0, 1), &SensorDistances::default());
        let snap = w.snapshot();
        w.update_from_sensors(
            Pose::new(0.0, 0.0, 0.0, 2),
            &SensorDistances {
                front: Some(100.0),
                ..Default::default()
            },
        );
        assert_eq!(snap.known_cells, 1);
        assert_eq!(snap.path.len(), 1);
        assert!(w.grid().known_count() > snap.grid.known_count());
    }

    #[test]
    fn summaries_mention_exploration() {
        let mut w = world();
        assert!(w.compact_summary().contains("pose=?"));
        w.update_from_sensors(Pose::new(0.5, -0.5, FRAC_PI_2, 1), &SensorDistances::default());
        assert!(w.compact_summary().contains("90°"));
        let text = w.summary_text();
        assert!(text.contains("Grid 50x50"));
        assert!(text.contains("Frontiers: 1"));
    }
}
