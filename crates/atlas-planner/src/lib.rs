//! `atlas-planner` – Local path planning.
//!
//! Finds cost-optimal, collision-free routes across an occupancy grid.  The
//! planner never owns a grid: it reads cell states through
//! [`OccupancyView`][atlas_types::OccupancyView] and converts coordinates
//! through [`GridGeometry`][atlas_types::GridGeometry], so any grid (or a
//! synthetic one in tests) can be planned over.
//!
//! # Modules
//!
//! - [`cost_map`] – [`CostMap`][cost_map::CostMap]: per-cell traversal cost
//!   with the unknown-space penalty and obstacle inflation applied.
//! - [`astar`] – [`LocalPlanner`][astar::LocalPlanner]: A* search with an
//!   octile heuristic, waypoint thinning and a serializable
//!   [`PlanReport`][astar::PlanReport].

pub mod astar;
pub mod cost_map;

pub use astar::{LocalPlanner, PlanError, PlanReport, PlannedPath, PlannerConfig, Waypoint};
pub use cost_map::CostMap;
