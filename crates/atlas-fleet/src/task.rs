//! Fleet task records.
//!
//! A task is created `active` when it is handed to a member and leaves the
//! coordinator when it is completed or failed.  `pending` covers tasks that
//! exist without an assignee.

use atlas_types::WorldPoint;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a task asks its assignee to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ExploreFrontier,
    NavigateTo,
    Patrol,
    Idle,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::ExploreFrontier => "explore_frontier",
            TaskKind::NavigateTo => "navigate_to",
            TaskKind::Patrol => "patrol",
            TaskKind::Idle => "idle",
        }
    }
}

/// The lifecycle state of a fleet task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

/// A single unit of fleet work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetTask {
    /// UUID v4.
    pub id: String,
    pub kind: TaskKind,
    /// Target position in the world frame (metres).
    pub target: WorldPoint,
    pub description: String,
    /// Device id of the member that owns the task.
    pub assignee: Option<String>,
    pub status: TaskStatus,
    /// RFC-3339 creation timestamp (UTC).
    pub created_at: String,
}

impl FleetTask {
    /// A new `pending` task with a fresh UUID.
    pub fn new(kind: TaskKind, target: WorldPoint, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            target,
            description: description.into(),
            assignee: None,
            status: TaskStatus::Pending,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Hand the task to `device_id` and mark it `active`.
    pub fn assign(mut self, device_id: impl Into<String>) -> Self {
        self.assignee = Some(device_id.into());
        self.status = TaskStatus::Active;
        self
    }

    /// First eight characters of the id, for display.
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}
