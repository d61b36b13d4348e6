//! [`AgentSession`] – one robot's navigation cycle.
//!
//! Each call to [`AgentSession::cycle`] runs the per-agent pipeline in a
//! fixed order while holding the world lock once:
//!
//! 1. **Sense** – fold the pose and range readings into the [`WorldModel`].
//! 2. **Goal check** – if the robot is within tolerance of its goal, advance
//!    to the next patrol waypoint or clear the goal.
//! 3. **Predict** – run one [`SpatialPredictor`] pass over the grid.
//! 4. **Plan** – A* from the current pose to the goal, when one is set.
//! 5. **Serialize** – adaptive full/patch frame for the downstream consumer.
//!
//! Decisions from an upstream decision-maker enter through
//! [`AgentSession::handle_decision_json`]; they are validated against the
//! grid before any state changes.
//!
//! # Example
//!
//! ```rust
//! use atlas_perception::world_model::SensorDistances;
//! use atlas_runtime::session::{AgentSession, SensorUpdate, SessionConfig};
//! use atlas_types::Pose;
//!
//! let mut session = AgentSession::new(SessionConfig::default());
//! let update = SensorUpdate {
//!     pose: Pose::new(0.0, 0.0, 0.0, 1),
//!     distances: SensorDistances { front: Some(80.0), ..Default::default() },
//! };
//! let out = session.cycle(&update);
//! assert!(out.frame.is_full());
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use atlas_codec::{CodecError, Frame, FrameGoal, FullFrame, GridSerializer, PatchFrame, SerializerConfig};
use atlas_fleet::registry::{SharedWorld, lock_world};
use atlas_perception::predictor::{PassReport, PredictorConfig, PredictorStats, SpatialPredictor};
use atlas_perception::world_model::{SensorDistances, WorldConfig, WorldModel};
use atlas_planner::{LocalPlanner, PlanError, PlanReport, PlannedPath, PlannerConfig};
use atlas_types::{Frontier, Pose, Timestamp, WorldPoint};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::decision::{Decision, DecisionError};

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> Timestamp {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`AgentSession`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Distance (metres) at which a goal counts as reached.
    pub goal_tolerance_m: f32,
    /// Stamp every successfully planned route into the grid as `path`.
    pub mark_path: bool,
    pub world: WorldConfig,
    pub predictor: PredictorConfig,
    pub planner: PlannerConfig,
    pub serializer: SerializerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            goal_tolerance_m: 0.3,
            mark_path: false,
            world: WorldConfig::default(),
            predictor: PredictorConfig::default(),
            planner: PlannerConfig::default(),
            serializer: SerializerConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs / outputs
// ─────────────────────────────────────────────────────────────────────────────

/// One sensor sample: the robot pose and its directional readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorUpdate {
    pub pose: Pose,
    pub distances: SensorDistances,
}

/// Everything a single [`AgentSession::cycle`] produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutput {
    /// Serializer frame counter after this cycle.
    pub cycle: u64,
    pub frame: Frame,
    pub prediction: PassReport,
    /// `None` when no goal is set.
    pub plan: Option<PlanReport>,
    /// The goal (or a patrol waypoint) was reached this cycle.
    pub goal_reached: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentSession
// ─────────────────────────────────────────────────────────────────────────────

pub struct AgentSession {
    config: SessionConfig,
    world: SharedWorld,
    predictor: SpatialPredictor,
    serializer: GridSerializer,
    planner: LocalPlanner,
    goal: Option<WorldPoint>,
    patrol: VecDeque<WorldPoint>,
}

impl AgentSession {
    /// A session over a fresh, all-unknown world.
    pub fn new(config: SessionConfig) -> Self {
        let world = Arc::new(Mutex::new(WorldModel::new(config.world.clone())));
        Self::with_world(config, world)
    }

    /// A session over an existing shared world, e.g. one held in a
    /// [`WorldRegistry`][atlas_fleet::WorldRegistry].
    pub fn with_world(config: SessionConfig, world: SharedWorld) -> Self {
        Self {
            predictor: SpatialPredictor::new(config.predictor.clone()),
            serializer: GridSerializer::new(config.serializer.clone()),
            planner: LocalPlanner::new(config.planner.clone()),
            config,
            world,
            goal: None,
            patrol: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Shared handle to the session's world model.
    pub fn world(&self) -> SharedWorld {
        Arc::clone(&self.world)
    }

    pub fn goal(&self) -> Option<WorldPoint> {
        self.goal
    }

    /// Remaining patrol waypoints after the current goal.
    pub fn patrol_queue(&self) -> impl Iterator<Item = &WorldPoint> {
        self.patrol.iter()
    }

    /// Set or clear the goal directly, dropping any patrol.
    pub fn set_goal(&mut self, goal: Option<WorldPoint>) {
        self.goal = goal;
        self.patrol.clear();
    }

    // ── Cycle ───────────────────────────────────────────────────────────────

    /// Run one sense → predict → plan → serialize cycle.
    pub fn cycle(&mut self, update: &SensorUpdate) -> CycleOutput {
        let now = update.pose.timestamp;
        let world = Arc::clone(&self.world);
        let mut world = lock_world(&world);

        world.update_from_sensors(update.pose, &update.distances);

        let goal_reached = self.check_goal(update.pose.position());
        let prediction = self.predictor.run_pass(world.grid_mut(), now);

        let plan = self.goal.map(|goal| {
            let result = self
                .planner
                .plan_world(world.grid(), world.grid(), update.pose.position(), goal);
            if self.config.mark_path
                && let Ok(path) = &result
            {
                let stamped = world.mark_path(&path.cells, now);
                debug!(stamped, "planned route stamped into grid");
            }
            if let Err(e) = &result {
                debug!(error = %e, "planning failed");
            }
            PlanReport::from_result(&result)
        });

        let frame_goal = self
            .goal
            .map(|g| FrameGoal::new(g, self.config.goal_tolerance_m));
        let frame = self.serializer.encode_adaptive(&world, frame_goal);

        debug!(
            cycle = self.serializer.cycle(),
            full = frame.is_full(),
            predicted = prediction.applied,
            goal_reached,
            "cycle complete"
        );

        CycleOutput {
            cycle: self.serializer.cycle(),
            frame,
            prediction,
            plan,
            goal_reached,
        }
    }

    /// Advance the patrol or clear the goal when `position` is within
    /// tolerance.  Returns whether a goal was reached.
    fn check_goal(&mut self, position: WorldPoint) -> bool {
        let Some(goal) = self.goal else {
            return false;
        };
        if position.distance(goal) > self.config.goal_tolerance_m {
            return false;
        }
        self.goal = self.patrol.pop_front();
        info!(x = goal.x, y = goal.y, next = ?self.goal, "goal reached");
        true
    }

    // ── Decisions ───────────────────────────────────────────────────────────

    /// Parse, validate and apply a JSON decision payload.
    pub fn handle_decision_json(
        &mut self,
        json: &str,
        now: Timestamp,
    ) -> Result<Option<WorldPoint>, DecisionError> {
        let decision = Decision::parse(json).inspect_err(|e| {
            warn!(error = %e, "rejected decision payload");
        })?;
        self.apply_decision(decision, now)
    }

    /// Validate `decision` against the grid and apply it.  Returns the goal
    /// in force afterwards.
    pub fn apply_decision(
        &mut self,
        decision: Decision,
        now: Timestamp,
    ) -> Result<Option<WorldPoint>, DecisionError> {
        let world = Arc::clone(&self.world);
        let mut world = lock_world(&world);
        if let Err(e) = decision.validate(world.grid()) {
            warn!(action = decision.action(), error = %e, "rejected decision");
            return Err(e);
        }

        match decision {
            Decision::NavigateTo { x, y } => {
                self.set_goal(Some(WorldPoint::new(x, y)));
            }
            Decision::ExploreFrontier => {
                let origin = world.pose().map(|p| p.position()).unwrap_or_default();
                let frontiers = world.find_frontiers();
                let target = pick_frontier(&frontiers, &world, origin)
                    .map(|f| world.grid_to_world(f.coord))
                    .ok_or(DecisionError::NoFrontier)?;
                self.set_goal(Some(target));
            }
            Decision::Patrol { waypoints } => {
                self.patrol = waypoints.into();
                self.goal = self.patrol.pop_front();
            }
            Decision::MarkCollected { x, y } => {
                let changed = world.mark_collected(WorldPoint::new(x, y), now);
                debug!(x, y, changed, "collectible marked as collected");
            }
            Decision::Stop => self.set_goal(None),
        }
        info!(goal = ?self.goal, "decision applied");
        Ok(self.goal)
    }

    // ── On-demand outputs ───────────────────────────────────────────────────

    /// Plan from the current pose to the goal without running a cycle.
    ///
    /// `None` when there is no goal or no pose yet.
    pub fn plan_to_goal(&self) -> Option<Result<PlannedPath, PlanError>> {
        let goal = self.goal?;
        let world = lock_world(&self.world);
        let start = world.pose()?.position();
        Some(self.planner.plan_world(world.grid(), world.grid(), start, goal))
    }

    /// Run one predictor pass outside the cycle.
    pub fn predict(&mut self, now: Timestamp) -> PassReport {
        let world = Arc::clone(&self.world);
        let mut world = lock_world(&world);
        self.predictor.run_pass(world.grid_mut(), now)
    }

    pub fn predictor_stats(&self) -> PredictorStats {
        self.predictor.stats()
    }

    /// Encode a full frame and make it the new delta baseline.
    pub fn full_frame(&mut self) -> FullFrame {
        let world = lock_world(&self.world);
        let goal = self
            .goal
            .map(|g| FrameGoal::new(g, self.config.goal_tolerance_m));
        self.serializer.encode_full(&world, goal)
    }

    /// Encode the changes since the last frame.
    pub fn patch_frame(&mut self) -> Result<PatchFrame, CodecError> {
        let world = lock_world(&self.world);
        self.serializer.encode_delta(&world)
    }

    pub fn decay(&self) {
        lock_world(&self.world).decay_confidence();
    }

    pub fn coarse_text(&self) -> String {
        let world = lock_world(&self.world);
        self.serializer.coarse_text(&world, self.goal)
    }

    pub fn summary_text(&self) -> String {
        lock_world(&self.world).summary_text()
    }
}

/// Frontier with the most unknown neighbours; ties go to the one nearest
/// `origin`.
fn pick_frontier<'a>(
    frontiers: &'a [Frontier],
    world: &WorldModel,
    origin: WorldPoint,
) -> Option<&'a Frontier> {
    frontiers.iter().min_by(|a, b| {
        let da = world.grid_to_world(a.coord).distance(origin);
        let db = world.grid_to_world(b.coord).distance(origin);
        b.unknown_neighbors
            .cmp(&a.unknown_neighbors)
            .then(da.total_cmp(&db))
    })
}
