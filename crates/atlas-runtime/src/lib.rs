//! `atlas-runtime` – Per-agent navigation cycle and process plumbing.
//!
//! Glues the world model, predictor, planner and serializer into one
//! caller-driven cycle per robot, and accepts typed decisions from an
//! upstream decision-maker.
//!
//! # Modules
//!
//! - [`session`] – [`AgentSession`][session::AgentSession]: runs
//!   sense → predict → plan → serialize in a fixed order under a single world
//!   lock and tracks the current goal or patrol.
//! - [`decision`] – [`Decision`][decision::Decision]: the JSON decision
//!   payloads (`navigate_to`, `explore_frontier`, `patrol`, `mark_collected`,
//!   `stop`) with their derived JSON Schema and grid validation.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to any OTLP-compatible collector.

pub mod decision;
pub mod session;
pub mod telemetry;

pub use decision::{Decision, DecisionError, decision_schema};
pub use session::{AgentSession, CycleOutput, SensorUpdate, SessionConfig, now_ms};
pub use telemetry::{TracerProviderGuard, init_tracing};
