//! JSON wire frames.
//!
//! ```json
//! {"type":"full","world_size_m":[5.0,5.0],"resolution_m":0.1,"width":50,"height":50,
//!  "rle":"U1200F3…","exploration":0.012,"pose":{"x":0.12,"y":-0.4,"yaw_deg":90}}
//! {"type":"patch","cycle":4,"changes":[[25,26,"F"]],"exploration":0.013,"change_count":1}
//! ```

use atlas_types::{CellState, GridCoord, Pose, WorldPoint};
use serde::{Deserialize, Serialize};

use crate::CodecError;
use crate::rle::{code_state, state_code};

/// Robot pose rounded for the wire: centimetre position, whole-degree yaw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramePose {
    pub x: f32,
    pub y: f32,
    pub yaw_deg: i32,
}

impl From<Pose> for FramePose {
    fn from(pose: Pose) -> Self {
        Self {
            x: round_to(pose.x, 100.0),
            y: round_to(pose.y, 100.0),
            yaw_deg: pose.rotation.to_degrees().round() as i32,
        }
    }
}

/// Navigation goal carried in a full frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGoal {
    pub x: f32,
    pub y: f32,
    pub tolerance_m: f32,
}

impl FrameGoal {
    pub fn new(point: WorldPoint, tolerance_m: f32) -> Self {
        Self {
            x: round_to(point.x, 100.0),
            y: round_to(point.y, 100.0),
            tolerance_m,
        }
    }
}

/// One changed cell: `[gx, gy, code]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChange(pub i32, pub i32, pub char);

impl CellChange {
    pub fn new(coord: GridCoord, state: CellState) -> Self {
        Self(coord.gx, coord.gy, state_code(state))
    }

    pub fn coord(&self) -> GridCoord {
        GridCoord::new(self.0, self.1)
    }

    pub fn state(&self) -> Result<CellState, CodecError> {
        code_state(self.2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullFrame {
    pub world_size_m: [f32; 2],
    pub resolution_m: f32,
    pub width: usize,
    pub height: usize,
    pub rle: String,
    pub exploration: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<FramePose>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<FrameGoal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchFrame {
    pub cycle: u64,
    pub changes: Vec<CellChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<FramePose>,
    pub exploration: f32,
    pub change_count: usize,
}

/// Any outbound frame, tagged by `"type"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    Full(FullFrame),
    Patch(PatchFrame),
}

impl Frame {
    pub fn is_full(&self) -> bool {
        matches!(self, Frame::Full(_))
    }

    pub fn to_json(&self) -> Result<String, CodecError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        Ok(serde_json::from_str(json)?)
    }
}

pub(crate) fn round_to(value: f32, scale: f32) -> f32 {
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_rounds_to_centimetres_and_degrees() {
        let p = FramePose::from(Pose::new(1.23456, -0.987, std::f32::consts::FRAC_PI_2, 7));
        assert!((p.x - 1.23).abs() < 1e-6);
        assert!((p.y + 0.99).abs() < 1e-6);
        assert_eq!(p.yaw_deg, 90);
    }

    #[test]
    fn frames_are_tagged_by_type() {
        let patch = Frame::Patch(PatchFrame {
            cycle: 3,
            changes: vec![CellChange::new(GridCoord::new(4, 5), CellState::Wall)],
            pose: None,
            exploration: 0.5,
            change_count: 1,
        });
        let json: serde_json::Value = serde_json::from_str(&patch.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "patch");
        assert_eq!(json["changes"][0], serde_json::json!([4, 5, "W"]));
        assert!(json.get("pose").is_none());

        let back = Frame::from_json(&patch.to_json().unwrap()).unwrap();
        assert_eq!(back, patch);
    }

    #[test]
    fn full_frame_json_fields() {
        let frame = Frame::Full(FullFrame {
            world_size_m: [5.0, 5.0],
            resolution_m: 0.1,
            width: 50,
            height: 50,
            rle: "U2500".into(),
            exploration: 0.0,
            pose: Some(FramePose::from(Pose::new(0.0, 0.0, 0.0, 1))),
            goal: Some(FrameGoal::new(WorldPoint::new(1.0, 2.0), 0.3)),
        });
        let json: serde_json::Value = serde_json::from_str(&frame.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "full");
        assert_eq!(json["rle"], "U2500");
        assert_eq!(json["pose"]["yaw_deg"], 0);
        assert!(json["goal"]["tolerance_m"].is_number());
    }

    #[test]
    fn garbage_json_is_rejected() {
        assert!(matches!(
            Frame::from_json("{\"type\":\"bogus\"}"),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn unknown_change_code_is_rejected() {
        let change = CellChange(0, 0, 'Q');
        assert!(matches!(change.state(), Err(CodecError::UnknownCode('Q'))));
    }
}
