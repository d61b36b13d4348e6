//! `atlas-perception` – Spatial world model layer.
//!
//! Turns noisy range readings and vision hits into a probabilistic occupancy
//! map that planners and language-model agents can reason about.
//!
//! # Modules
//!
//! - [`grid`] – [`OccupancyGrid`][grid::OccupancyGrid]: fixed-size grid of
//!   [`GridCell`][grid::GridCell]s with the cell-state priority rules.
//! - [`world_model`] – [`WorldModel`][world_model::WorldModel]: ray casting
//!   from the robot pose, wall seeding, frontier search and text summaries.
//! - [`predictor`] – [`SpatialPredictor`][predictor::SpatialPredictor]:
//!   heuristic fill-in of unobserved cells with accuracy tracking.

pub mod grid;
pub mod predictor;
pub mod world_model;
