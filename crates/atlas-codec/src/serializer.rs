//! Stateful frame encoder and the matching consumer-side decoder.
//!
//! [`GridSerializer`] keeps the flattened grid of the last emitted frame as
//! its baseline.  A delta frame lists only cells whose state changed since
//! that baseline; the adaptive mode falls back to a full frame when no
//! baseline exists or too much of the grid changed.

use atlas_perception::world_model::WorldModel;
use atlas_types::{CellState, GridCoord, OccupancyView, WorldPoint};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CodecError;
use crate::coarse::coarse_text;
use crate::frame::{CellChange, Frame, FrameGoal, FramePose, FullFrame, PatchFrame, round_to};
use crate::rle::{rle_decode_exact, rle_encode};

/// Tuning for [`GridSerializer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Changed-cell fraction above which adaptive encoding emits a full
    /// frame.
    pub delta_threshold: f32,
    /// Block edge for the coarse text grid.
    pub coarse_block: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        Self {
            delta_threshold: 0.3,
            coarse_block: 2,
        }
    }
}

#[derive(Debug, Clone)]
struct Baseline {
    width: usize,
    height: usize,
    states: Vec<CellState>,
}

/// Producer side: encodes a [`WorldModel`] into wire frames.
#[derive(Debug, Clone, Default)]
pub struct GridSerializer {
    config: SerializerConfig,
    baseline: Option<Baseline>,
    cycle: u64,
}

impl GridSerializer {
    pub fn new(config: SerializerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Number of frames emitted since construction or [`reset`][Self::reset].
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Forget the baseline and restart the cycle counter.
    pub fn reset(&mut self) {
        self.baseline = None;
        self.cycle = 0;
    }

    /// Encode the whole grid and make it the new baseline.
    pub fn encode_full(&mut self, world: &WorldModel, goal: Option<FrameGoal>) -> FullFrame {
        let grid = world.grid();
        let states = grid.flatten();
        let rle = rle_encode(&states);
        let (w_m, h_m) = grid.world_size_m();

        self.cycle += 1;
        debug!(cycle = self.cycle, rle_len = rle.len(), "full frame");
        self.baseline = Some(Baseline {
            width: grid.width(),
            height: grid.height(),
            states,
        });

        FullFrame {
            world_size_m: [w_m, h_m],
            resolution_m: grid.resolution_m(),
            width: grid.width(),
            height: grid.height(),
            rle,
            exploration: round_to(grid.exploration_fraction(), 1000.0),
            pose: world.pose().map(FramePose::from),
            goal,
        }
    }

    /// Encode the cells changed since the baseline and advance it.
    pub fn encode_delta(&mut self, world: &WorldModel) -> Result<PatchFrame, CodecError> {
        let grid = world.grid();
        let states = grid.flatten();
        let changes = self.diff(grid.width(), grid.height(), &states)?;
        Ok(self.commit_delta(world, states, changes))
    }

    /// Delta when a compatible baseline exists and at most
    /// `delta_threshold` of the cells changed; full otherwise.
    pub fn encode_adaptive(&mut self, world: &WorldModel, goal: Option<FrameGoal>) -> Frame {
        let grid = world.grid();
        let total = grid.width() * grid.height();
        let states = grid.flatten();
        let changes = match self.diff(grid.width(), grid.height(), &states) {
            Ok(changes) => changes,
            Err(_) => return Frame::Full(self.encode_full(world, goal)),
        };
        let fraction = if total == 0 {
            0.0
        } else {
            changes.len() as f32 / total as f32
        };
        if fraction > self.config.delta_threshold {
            debug!(fraction, "change fraction above threshold, sending full frame");
            return Frame::Full(self.encode_full(world, goal));
        }
        Frame::Patch(self.commit_delta(world, states, changes))
    }

    fn commit_delta(
        &mut self,
        world: &WorldModel,
        states: Vec<CellState>,
        changes: Vec<CellChange>,
    ) -> PatchFrame {
        let grid = world.grid();
        self.cycle += 1;
        debug!(cycle = self.cycle, changes = changes.len(), "patch frame");
        self.baseline = Some(Baseline {
            width: grid.width(),
            height: grid.height(),
            states,
        });

        PatchFrame {
            cycle: self.cycle,
            change_count: changes.len(),
            changes,
            pose: world.pose().map(FramePose::from),
            exploration: round_to(grid.exploration_fraction(), 1000.0),
        }
    }

    /// Coarse text rendering of the world using the configured block size.
    pub fn coarse_text(&self, world: &WorldModel, goal: Option<WorldPoint>) -> String {
        coarse_text(world.grid(), self.config.coarse_block, world.pose(), goal)
    }

    fn diff(&self, width: usize, height: usize, states: &[CellState]) -> Result<Vec<CellChange>, CodecError> {
        let base = self.baseline.as_ref().ok_or(CodecError::NoBaseline)?;
        if base.width != width || base.height != height {
            return Err(CodecError::LengthMismatch {
                expected: base.states.len(),
                found: states.len(),
            });
        }
        Ok(base
            .states
            .iter()
            .zip(states)
            .enumerate()
            .filter(|(_, (old, new))| old != new)
            .map(|(i, (_, &new))| {
                CellChange::new(GridCoord::new((i % width) as i32, (i / width) as i32), new)
            })
            .collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FrameDecoder
// ─────────────────────────────────────────────────────────────────────────────

/// Largest grid a [`FrameDecoder`] accepts (4096 × 4096 cells).
pub const MAX_DECODED_CELLS: usize = 4096 * 4096;

/// Consumer side: rebuilds the flattened grid from a frame stream.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    width: usize,
    height: usize,
    states: Vec<CellState>,
    pose: Option<FramePose>,
    exploration: f32,
    last_cycle: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a full frame (replaces the grid) or a patch (updates cells).
    pub fn apply(&mut self, frame: &Frame) -> Result<(), CodecError> {
        match frame {
            Frame::Full(full) => {
                let expected = full
                    .width
                    .checked_mul(full.height)
                    .filter(|&cells| cells <= MAX_DECODED_CELLS)
                    .ok_or(CodecError::GridTooLarge {
                        width: full.width,
                        height: full.height,
                    })?;
                self.states = rle_decode_exact(&full.rle, expected)?;
                self.width = full.width;
                self.height = full.height;
                self.pose = full.pose;
                self.exploration = full.exploration;
            }
            Frame::Patch(patch) => {
                if self.states.is_empty() {
                    return Err(CodecError::NoBaseline);
                }
                let mut updates = Vec::with_capacity(patch.changes.len());
                for change in &patch.changes {
                    let (gx, gy) = (change.0, change.1);
                    if !self.in_bounds(change.coord()) {
                        return Err(CodecError::OutOfBounds { gx, gy });
                    }
                    updates.push((gy as usize * self.width + gx as usize, change.state()?));
                }
                for (idx, state) in updates {
                    self.states[idx] = state;
                }
                if patch.pose.is_some() {
                    self.pose = patch.pose;
                }
                self.exploration = patch.exploration;
                self.last_cycle = patch.cycle;
            }
        }
        Ok(())
    }

    pub fn apply_json(&mut self, json: &str) -> Result<(), CodecError> {
        self.apply(&Frame::from_json(json)?)
    }

    pub fn states(&self) -> &[CellState] {
        &self.states
    }

    pub fn pose(&self) -> Option<FramePose> {
        self.pose
    }

    pub fn exploration(&self) -> f32 {
        self.exploration
    }

    /// Cycle number of the last applied patch.
    pub fn last_cycle(&self) -> u64 {
        self.last_cycle
    }
}

impl OccupancyView for FrameDecoder {
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
        self.states
            .get(coord.gy as usize * self.width + coord.gx as usize)
            .copied()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
