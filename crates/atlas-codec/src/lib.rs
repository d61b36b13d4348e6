//! `atlas-codec` – Compact grid encodings for bandwidth-constrained consumers.
//!
//! # Modules
//!
//! - [`rle`] – one-letter state codes and run-length encoding of a flattened
//!   grid (`U120F3W2`).
//! - [`frame`] – the JSON wire frames: [`FullFrame`][frame::FullFrame] and
//!   [`PatchFrame`][frame::PatchFrame], tagged by `"type"`.
//! - [`coarse`] – block downsampling and the north-up text rendering with
//!   robot heading and goal glyphs.
//! - [`serializer`] – [`GridSerializer`][serializer::GridSerializer]
//!   (full / delta / adaptive encoding against a per-cycle baseline) and the
//!   consumer-side [`FrameDecoder`][serializer::FrameDecoder].

pub mod coarse;
pub mod frame;
pub mod rle;
pub mod serializer;

use thiserror::Error;

pub use frame::{CellChange, Frame, FrameGoal, FramePose, FullFrame, PatchFrame};
pub use serializer::{FrameDecoder, GridSerializer, SerializerConfig};

/// Errors raised while encoding or decoding grid frames.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("No baseline frame: encode a full frame first")]
    NoBaseline,

    #[error("Malformed RLE at byte {position}: {reason}")]
    MalformedRle { position: usize, reason: String },

    #[error("Unknown state code '{0}'")]
    UnknownCode(char),

    #[error("Length mismatch: expected {expected} cells, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("Grid of {width}×{height} cells is too large to decode")]
    GridTooLarge { width: usize, height: usize },

    #[error("Change at ({gx}, {gy}) is outside the grid")]
    OutOfBounds { gx: i32, gy: i32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
