//! Fleet Coordinator.
//!
//! Sits above the world models of every registered member and is the only
//! component that touches more than one grid at a time.  A coordination round
//! is caller-sequenced:
//!
//! 1. [`FleetCoordinator::merge`] folds member grids into the shared grid.
//! 2. [`FleetCoordinator::assign_frontiers`] hands exploration targets to
//!    idle members, greedily and nearest-first.
//! 3. [`FleetCoordinator::distribute`] fills the members' unknown cells from
//!    the shared grid at a discounted confidence.
//!
//! Merging never lowers shared confidence, and distributed data is always
//! trusted less than first-hand data: distributed cells keep a visit count
//! of zero, so they stay prediction targets and any direct observation
//! outranks them.
//!
//! # Example
//!
//! ```rust
//! use atlas_fleet::{FleetConfig, FleetCoordinator, WorldRegistry};
//! use atlas_perception::world_model::{WorldConfig, WorldModel};
//! use atlas_types::{CellState, GridCoord, Pose};
//!
//! let world_config = WorldConfig::default();
//! let mut registry = WorldRegistry::new();
//! let a = registry.insert("robot_a", WorldModel::new(world_config.clone()));
//! registry.insert("robot_b", WorldModel::new(world_config.clone()));
//!
//! let mut fleet = FleetCoordinator::new(FleetConfig::default(), &world_config);
//! fleet.register("robot_a", Some(Pose::new(0.0, 0.0, 0.0, 1)), 1).unwrap();
//! fleet.register("robot_b", Some(Pose::new(1.0, 0.0, 0.0, 1)), 1).unwrap();
//!
//! a.lock().unwrap().grid_mut().observe(GridCoord::new(5, 5), CellState::Wall, 0.9, 1);
//! let merged = fleet.merge(&registry);
//! assert_eq!(merged.members_merged, 2);
//!
//! fleet.distribute(&registry);
//! let b = registry.get("robot_b").unwrap();
//! let cell = *b.lock().unwrap().grid().cell(GridCoord::new(5, 5)).unwrap();
//! assert_eq!(cell.state, CellState::Wall);
//! assert!((cell.confidence - 0.72).abs() < 1e-5);
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;

use atlas_perception::grid::OccupancyGrid;
use atlas_perception::world_model::WorldConfig;
use atlas_types::{CellState, Frontier, GridGeometry, Pose, Timestamp, WorldPoint};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::{WorldRegistry, lock_world};
use crate::task::{FleetTask, TaskKind, TaskStatus};

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from fleet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FleetError {
    #[error("Fleet is full ({max} members)")]
    FleetFull { max: usize },
    #[error("Device already registered: {0}")]
    AlreadyRegistered(String),
    #[error("Unknown fleet member: {0}")]
    UnknownMember(String),
    #[error("Task not found: {0}")]
    UnknownTask(String),
    #[error("Member {0} already has an active task")]
    MemberBusy(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Which member cells win a merge conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Adopt the member state when its confidence is strictly higher.
    #[default]
    MaxConfidence,
    /// Adopt the member state when its timestamp is strictly newer.
    LatestUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub max_members: usize,
    pub merge_strategy: MergeStrategy,
    /// Factor applied to shared confidence when filling member cells.
    pub distribution_discount: f32,
    /// Frontiers closer than this (metres) to a target already assigned in
    /// the same round are skipped.
    pub min_target_separation_m: f32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            max_members: 8,
            merge_strategy: MergeStrategy::MaxConfidence,
            distribution_discount: 0.8,
            min_target_separation_m: 0.5,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetMember {
    pub device_id: String,
    pub pose: Option<Pose>,
    pub task_id: Option<String>,
    pub active: bool,
    pub last_seen: Timestamp,
}

impl FleetMember {
    fn is_idle(&self) -> bool {
        self.active && self.task_id.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub cells_updated: usize,
    pub members_merged: usize,
    /// Inactive, unregistered-world and mismatched-dimension members.
    pub members_skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DistributeReport {
    pub cells_shared: usize,
    pub members_updated: usize,
    pub members_skipped: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// FleetCoordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Membership, shared map and task allocation for one fleet.
#[derive(Debug, Clone)]
pub struct FleetCoordinator {
    config: FleetConfig,
    shared: OccupancyGrid,
    members: BTreeMap<String, FleetMember>,
    /// Live tasks in creation order.
    tasks: Vec<FleetTask>,
}

impl FleetCoordinator {
    /// Create a coordinator whose shared grid matches `world`.
    pub fn new(config: FleetConfig, world: &WorldConfig) -> Self {
        Self {
            config,
            shared: OccupancyGrid::for_world_size(
                world.world_width_m,
                world.world_height_m,
                world.resolution_cm,
            ),
            members: BTreeMap::new(),
            tasks: Vec::new(),
        }
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn shared_grid(&self) -> &OccupancyGrid {
        &self.shared
    }

    pub fn member(&self, device_id: &str) -> Option<&FleetMember> {
        self.members.get(device_id)
    }

    /// Members in ascending device-id order.
    pub fn members(&self) -> impl Iterator<Item = &FleetMember> {
        self.members.values()
    }

    pub fn task(&self, task_id: &str) -> Option<&FleetTask> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn tasks(&self) -> &[FleetTask] {
        &self.tasks
    }

    // ── membership ──────────────────────────────────────────────────────────

    pub fn register(
        &mut self,
        device_id: &str,
        pose: Option<Pose>,
        now: Timestamp,
    ) -> Result<(), FleetError> {
        if self.members.contains_key(device_id) {
            return Err(FleetError::AlreadyRegistered(device_id.to_string()));
        }
        if self.members.len() >= self.config.max_members {
            return Err(FleetError::FleetFull {
                max: self.config.max_members,
            });
        }
        self.members.insert(
            device_id.to_string(),
            FleetMember {
                device_id: device_id.to_string(),
                pose,
                task_id: None,
                active: true,
                last_seen: now,
            },
        );
        info!(device_id, members = self.members.len(), "fleet member registered");
        Ok(())
    }

    /// Remove a member; its task, if any, is failed and dropped.
    pub fn deregister(&mut self, device_id: &str) -> Result<FleetMember, FleetError> {
        let member = self
            .members
            .remove(device_id)
            .ok_or_else(|| FleetError::UnknownMember(device_id.to_string()))?;
        if let Some(task_id) = &member.task_id {
            self.tasks.retain(|t| &t.id != task_id);
            warn!(device_id, task_id = %task_id, "task failed: member deregistered");
        }
        info!(device_id, "fleet member deregistered");
        Ok(member)
    }

    pub fn update_pose(&mut self, device_id: &str, pose: Pose, now: Timestamp) -> Result<(), FleetError> {
        let member = self.member_mut(device_id)?;
        member.pose = Some(pose);
        member.last_seen = now;
        member.active = true;
        Ok(())
    }

    pub fn heartbeat(&mut self, device_id: &str, now: Timestamp) -> Result<(), FleetError> {
        let member = self.member_mut(device_id)?;
        member.last_seen = now;
        member.active = true;
        Ok(())
    }

    /// Mark members not seen within `timeout_ms` inactive and fail their
    /// tasks.  Returns the ids that went stale.
    pub fn expire_stale(&mut self, now: Timestamp, timeout_ms: u64) -> Vec<String> {
        let mut stale = Vec::new();
        for member in self.members.values_mut() {
            if member.active && now.saturating_sub(member.last_seen) > timeout_ms {
                member.active = false;
                if let Some(task_id) = member.task_id.take() {
                    self.tasks.retain(|t| t.id != task_id);
                }
                warn!(device_id = %member.device_id, "fleet member went stale");
                stale.push(member.device_id.clone());
            }
        }
        stale
    }

    fn member_mut(&mut self, device_id: &str) -> Result<&mut FleetMember, FleetError> {
        self.members
            .get_mut(device_id)
            .ok_or_else(|| FleetError::UnknownMember(device_id.to_string()))
    }

    // ── map sharing ─────────────────────────────────────────────────────────

    /// Fold every active member grid into the shared grid.
    pub fn merge(&mut self, registry: &WorldRegistry) -> MergeReport {
        let mut report = MergeReport::default();
        let strategy = self.config.merge_strategy;

        for member in self.members.values_mut() {
            let Some(world) = registry.get(&member.device_id).filter(|_| member.active) else {
                report.members_skipped += 1;
                continue;
            };
            let world = lock_world(&world);
            if !world.grid().same_shape(&self.shared) {
                debug!(device_id = %member.device_id, "skipping merge: grid dimensions differ");
                report.members_skipped += 1;
                continue;
            }
            if let Some(pose) = world.pose() {
                member.pose = Some(pose);
            }

            for theirs in world.grid().cells().iter().filter(|c| c.state.is_known()) {
                let Some(ours) = self.shared.cell_mut(theirs.coord()) else {
                    continue;
                };
                let adopt = ours.state == CellState::Unknown
                    || match strategy {
                        MergeStrategy::MaxConfidence => theirs.confidence > ours.confidence,
                        MergeStrategy::LatestUpdate => theirs.last_update > ours.last_update,
                    };
                let before = *ours;
                if adopt {
                    ours.state = theirs.state;
                }
                ours.confidence = ours.confidence.max(theirs.confidence);
                ours.last_update = ours.last_update.max(theirs.last_update);
                ours.visit_count = ours.visit_count.max(theirs.visit_count);
                if *ours != before {
                    report.cells_updated += 1;
                }
            }
            report.members_merged += 1;
        }

        debug!(
            cells_updated = report.cells_updated,
            merged = report.members_merged,
            skipped = report.members_skipped,
            "fleet merge"
        );
        report
    }

    /// Copy shared knowledge into the `unknown` cells of every active member.
    pub fn distribute(&self, registry: &WorldRegistry) -> DistributeReport {
        let mut report = DistributeReport::default();
        let discount = self.config.distribution_discount.clamp(0.0, 1.0);

        for member in self.members.values() {
            let Some(world) = registry.get(&member.device_id).filter(|_| member.active) else {
                report.members_skipped += 1;
                continue;
            };
            let mut world = lock_world(&world);
            if !world.grid().same_shape(&self.shared) {
                debug!(device_id = %member.device_id, "skipping distribution: grid dimensions differ");
                report.members_skipped += 1;
                continue;
            }
            let grid = world.grid_mut();
            for shared in self.shared.cells().iter().filter(|c| c.state.is_known()) {
                let Some(cell) = grid.cell_mut(shared.coord()) else {
                    continue;
                };
                if cell.state != CellState::Unknown {
                    continue;
                }
                cell.state = shared.state;
                cell.confidence = shared.confidence * discount;
                cell.last_update = shared.last_update;
                report.cells_shared += 1;
            }
            report.members_updated += 1;
        }

        debug!(
            cells_shared = report.cells_shared,
            updated = report.members_updated,
            "fleet distribution"
        );
        report
    }

    // ── tasks ───────────────────────────────────────────────────────────────

    /// Greedily hand frontiers to idle members, best frontier first.
    ///
    /// Members without a known pose are not considered.
    pub fn assign_frontiers(&mut self, frontiers: &[Frontier]) -> Vec<FleetTask> {
        let mut ordered = frontiers.to_vec();
        ordered.sort_by(|a, b| {
            b.unknown_neighbors
                .cmp(&a.unknown_neighbors)
                .then_with(|| a.coord.cmp(&b.coord))
        });

        let mut assigned: Vec<FleetTask> = Vec::new();
        for frontier in ordered {
            let idle: Vec<(&str, WorldPoint)> = self
                .members
                .values()
                .filter(|m| m.is_idle())
                .filter_map(|m| m.pose.map(|p| (m.device_id.as_str(), p.position())))
                .collect();
            if idle.is_empty() {
                break;
            }

            let target = self.shared.grid_to_world(frontier.coord);
            if assigned
                .iter()
                .any(|t| t.target.distance(target) < self.config.min_target_separation_m)
            {
                continue;
            }

            let Some((device_id, _)) = idle
                .into_iter()
                .min_by(|a, b| a.1.distance(target).total_cmp(&b.1.distance(target)))
            else {
                break;
            };
            let device_id = device_id.to_string();
            let task = FleetTask::new(
                TaskKind::ExploreFrontier,
                target,
                format!(
                    "Explore frontier ({}, {}) with {} unknown neighbours",
                    frontier.coord.gx, frontier.coord.gy, frontier.unknown_neighbors
                ),
            )
            .assign(device_id.clone());

            if let Some(member) = self.members.get_mut(&device_id) {
                member.task_id = Some(task.id.clone());
            }
            debug!(device_id = %device_id, gx = frontier.coord.gx, gy = frontier.coord.gy, "frontier assigned");
            assigned.push(task);
        }

        self.tasks.extend(assigned.iter().cloned());
        assigned
    }

    /// Hand an explicit task to an idle member.
    pub fn assign_task(
        &mut self,
        device_id: &str,
        kind: TaskKind,
        target: WorldPoint,
        description: &str,
    ) -> Result<FleetTask, FleetError> {
        let member = self.member_mut(device_id)?;
        if member.task_id.is_some() {
            return Err(FleetError::MemberBusy(device_id.to_string()));
        }
        let task = FleetTask::new(kind, target, description).assign(device_id);
        member.task_id = Some(task.id.clone());
        info!(device_id, task_id = %task.id, kind = kind.as_str(), "task assigned");
        self.tasks.push(task.clone());
        Ok(task)
    }

    pub fn complete_task(&mut self, task_id: &str) -> Result<FleetTask, FleetError> {
        self.finish_task(task_id, TaskStatus::Completed)
    }

    pub fn fail_task(&mut self, task_id: &str) -> Result<FleetTask, FleetError> {
        self.finish_task(task_id, TaskStatus::Failed)
    }

    fn finish_task(&mut self, task_id: &str, status: TaskStatus) -> Result<FleetTask, FleetError> {
        let idx = self
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| FleetError::UnknownTask(task_id.to_string()))?;
        let mut task = self.tasks.remove(idx);
        task.status = status;
        if let Some(member) = task
            .assignee
            .as_deref()
            .and_then(|id| self.members.get_mut(id))
        {
            member.task_id = None;
        }
        info!(task_id, status = status.as_str(), "task finished");
        Ok(task)
    }

    // ── reporting ───────────────────────────────────────────────────────────

    /// Line-oriented digest of members and tasks.
    pub fn status_text(&self) -> String {
        let mut out = String::new();
        let active = self.members.values().filter(|m| m.active).count();
        let _ = writeln!(
            out,
            "Fleet: {} member(s), {} active, {} task(s), shared map {:.1}% explored",
            self.members.len(),
            active,
            self.tasks.len(),
            self.shared.exploration_fraction() * 100.0
        );
        for m in self.members.values() {
            let position = match m.pose {
                Some(p) => format!("({:.2}, {:.2})", p.x, p.y),
                None => "(unknown)".to_string(),
            };
            let doing = match m.task_id.as_deref().and_then(|id| self.task(id)) {
                Some(t) => format!("task {} {}", t.short_id(), t.kind.as_str()),
                None => "idle".to_string(),
            };
            let liveness = if m.active { "" } else { " [stale]" };
            let _ = writeln!(out, "  {} @ {position}: {doing}{liveness}", m.device_id);
        }
        for t in &self.tasks {
            let _ = writeln!(
                out,
                "  task {}: {} -> {} [{}]",
                t.short_id(),
                t.description,
                t.assignee.as_deref().unwrap_or("-"),
                t.status.as_str()
            );
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
