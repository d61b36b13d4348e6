//! Decision payloads from an upstream decision-maker.
//!
//! Decisions arrive as JSON tagged `{"action": ..., "payload": ...}`.  They
//! are parsed and validated against the current grid before anything is
//! written, so a malformed or out-of-range payload never touches the map.
//!
//! ```rust
//! use atlas_runtime::decision::Decision;
//!
//! let d = Decision::parse(r#"{"action":"navigate_to","payload":{"x":1.5,"y":2.0}}"#).unwrap();
//! assert_eq!(d, Decision::NavigateTo { x: 1.5, y: 2.0 });
//! ```

use atlas_types::{GridGeometry, OccupancyView, WorldPoint};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every action a decision-maker may request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum Decision {
    /// Plan towards a world position (metres).
    NavigateTo { x: f32, y: f32 },
    /// Pick the most promising frontier and plan towards it.
    ExploreFrontier,
    /// Visit the waypoints in order.
    Patrol { waypoints: Vec<WorldPoint> },
    /// The collectible at this position has been picked up.
    MarkCollected { x: f32, y: f32 },
    /// Drop the current goal.
    Stop,
}

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error("Malformed decision payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Decision contains a non-finite coordinate")]
    NonFinite,
    #[error("Target ({x:.2}, {y:.2}) lies outside the grid")]
    OutsideGrid { x: f32, y: f32 },
    #[error("Patrol requires at least one waypoint")]
    EmptyPatrol,
    #[error("No frontier left to explore")]
    NoFrontier,
}

impl Decision {
    pub fn parse(json: &str) -> Result<Self, DecisionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn action(&self) -> &'static str {
        match self {
            Decision::NavigateTo { .. } => "navigate_to",
            Decision::ExploreFrontier => "explore_frontier",
            Decision::Patrol { .. } => "patrol",
            Decision::MarkCollected { .. } => "mark_collected",
            Decision::Stop => "stop",
        }
    }

    /// World positions this decision refers to.
    pub fn targets(&self) -> Vec<WorldPoint> {
        match self {
            Decision::NavigateTo { x, y } | Decision::MarkCollected { x, y } => {
                vec![WorldPoint::new(*x, *y)]
            }
            Decision::Patrol { waypoints } => waypoints.clone(),
            Decision::ExploreFrontier | Decision::Stop => Vec::new(),
        }
    }

    /// Reject non-finite coordinates, empty patrols and targets that fall
    /// outside `grid`.
    pub fn validate<M>(&self, grid: &M) -> Result<(), DecisionError>
    where
        M: GridGeometry + OccupancyView + ?Sized,
    {
        if let Decision::Patrol { waypoints } = self
            && waypoints.is_empty()
        {
            return Err(DecisionError::EmptyPatrol);
        }
        for target in self.targets() {
            if !target.is_finite() {
                return Err(DecisionError::NonFinite);
            }
            if !grid.in_bounds(grid.world_to_grid(target)) {
                return Err(DecisionError::OutsideGrid {
                    x: target.x,
                    y: target.y,
                });
            }
        }
        Ok(())
    }
}

/// JSON Schema of [`Decision`], for constraining the producer's output.
pub fn decision_schema() -> serde_json::Value {
    serde_json::to_value(schema_for!(Decision)).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_perception::grid::OccupancyGrid;

    fn grid() -> OccupancyGrid {
        OccupancyGrid::for_world_size(5.0, 5.0, 10.0)
    }

    #[test]
    fn parses_every_action() {
        let cases = [
            (
                r#"{"action":"navigate_to","payload":{"x":1.0,"y":2.0}}"#,
                Decision::NavigateTo { x: 1.0, y: 2.0 },
            ),
            (r#"{"action":"explore_frontier"}"#, Decision::ExploreFrontier),
            (
                r#"{"action":"patrol","payload":{"waypoints":[{"x":0.5,"y":0.5},{"x":4.0,"y":4.0}]}}"#,
                Decision::Patrol {
                    waypoints: vec![WorldPoint::new(0.5, 0.5), WorldPoint::new(4.0, 4.0)],
                },
            ),
            (
                r#"{"action":"mark_collected","payload":{"x":3.0,"y":1.0}}"#,
                Decision::MarkCollected { x: 3.0, y: 1.0 },
            ),
            (r#"{"action":"stop"}"#, Decision::Stop),
        ];
        for (json, expected) in cases {
            let parsed = Decision::parse(json).unwrap();
            assert_eq!(parsed, expected);
            assert_eq!(parsed.action(), json.split('"').nth(3).unwrap());
        }
    }

    #[test]
    fn unknown_action_is_a_parse_error() {
        let err = Decision::parse(r#"{"action":"fly","payload":{}}"#).unwrap_err();
        assert!(matches!(err, DecisionError::Parse(_)));
    }

    #[test]
    fn serializes_with_action_tag() {
        let json = serde_json::to_value(Decision::NavigateTo { x: 1.0, y: 2.0 }).unwrap();
        assert_eq!(json["action"], "navigate_to");
        assert_eq!(json["payload"]["x"], 1.0);
    }

    #[test]
    fn schema_mentions_actions() {
        let schema = decision_schema().to_string();
        assert!(schema.contains("navigate_to"));
        assert!(schema.contains("explore_frontier"));
    }

    #[test]
    fn in_grid_target_is_valid() {
        assert!(Decision::NavigateTo { x: 1.0, y: -1.5 }.validate(&grid()).is_ok());
        assert!(Decision::Stop.validate(&grid()).is_ok());
    }

    #[test]
    fn out_of_grid_target_is_rejected() {
        let err = Decision::NavigateTo { x: 9.0, y: 1.0 }
            .validate(&grid())
            .unwrap_err();
        assert!(matches!(err, DecisionError::OutsideGrid { .. }));

        let patrol = Decision::Patrol {
            waypoints: vec![WorldPoint::new(1.0, 1.0), WorldPoint::new(-4.0, 1.0)],
        };
        assert!(matches!(
            patrol.validate(&grid()),
            Err(DecisionError::OutsideGrid { .. })
        ));
    }

    #[test]
    fn huge_finite_target_is_outside_grid() {
        for (x, y) in [(3.0e38, 0.0), (0.0, -3.0e38), (f32::MAX, f32::MIN)] {
            let err = Decision::NavigateTo { x, y }.validate(&grid()).unwrap_err();
            assert!(matches!(err, DecisionError::OutsideGrid { .. }), "({x}, {y})");
        }
    }

    #[test]
    fn nan_target_is_rejected() {
        let err = Decision::MarkCollected { x: f32::NAN, y: 1.0 }
            .validate(&grid())
            .unwrap_err();
        assert!(matches!(err, DecisionError::NonFinite));
    }

    #[test]
    fn empty_patrol_is_rejected() {
        let err = Decision::Patrol { waypoints: vec![] }
            .validate(&grid())
            .unwrap_err();
        assert!(matches!(err, DecisionError::EmptyPatrol));
    }
}
