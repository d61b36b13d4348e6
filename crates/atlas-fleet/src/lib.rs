//! `atlas-fleet` – Multi-agent map sharing and task allocation.
//!
//! # Modules
//!
//! - [`registry`] – [`WorldRegistry`][registry::WorldRegistry]: session-owned
//!   map from device id to each agent's lockable
//!   [`WorldModel`][atlas_perception::world_model::WorldModel].
//! - [`task`] – [`FleetTask`][task::FleetTask] records and their lifecycle
//!   states.
//! - [`coordinator`] – [`FleetCoordinator`][coordinator::FleetCoordinator]:
//!   membership, grid merge, greedy frontier assignment and distribution of
//!   the shared map back to members.

pub mod coordinator;
pub mod registry;
pub mod task;

pub use coordinator::{
    DistributeReport, FleetConfig, FleetCoordinator, FleetError, FleetMember, MergeReport,
    MergeStrategy,
};
pub use registry::{SharedWorld, WorldRegistry};
pub use task::{FleetTask, TaskKind, TaskStatus};
