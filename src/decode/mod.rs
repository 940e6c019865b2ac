//! Host-side interpretation of extracted sideband data.
//!
//! [`ModelRegistry::decode`] turns validated header + payload bytes into a
//! [`DecodedResult`] that owns its data and knows how to draw itself. The
//! draw function is chosen once, when the result is decoded, from the
//! `(output_type, model_identifier)` pair.
//!
//! ```text
//! ExtractedMetadata ──► ModelRegistry ──► DecodedResult ──► DrawFn ──► Canvas
//! ```

pub mod records;
pub mod registry;
pub mod render;
pub mod reuse;

pub use records::{encode_records, parse_records, FaceGenderAge, FaceRect, FixedRecord};
pub use registry::{ModelRegistry, TensorPostProcess};
pub use render::{
    Canvas, Color, DrawFn, DrawOp, DrawRequest, RecordingCanvas, Rgb24Canvas, OVERLAY_COLOR,
};
pub use reuse::{ReuseWindow, DEFAULT_REUSE_WINDOW_MS};

use crate::sideband::{ModelIdentifier, OutputType};
use crate::types::{Geometry, Rect};
use std::fmt;

/// One detection produced by a tensor post-processor, in NPU coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub rect: Rect,
    pub score: f32,
    pub label: String,
}

/// Post-processed output of a raw-tensor model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Data owned by a decoded result.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    Detections(DetectionSet),
    /// Fixed records, verbatim from the wire.
    Records(Vec<u8>),
}

/// Decoded inference result of one picture, bound to its draw function.
#[derive(Clone)]
pub struct DecodedResult {
    model: ModelIdentifier,
    output_type: OutputType,
    payload: DecodedPayload,
    count: u32,
    geometry: Geometry,
    timestamp_us: u64,
    draw: DrawFn,
}

impl DecodedResult {
    pub fn new(
        model: ModelIdentifier,
        output_type: OutputType,
        payload: DecodedPayload,
        count: u32,
        geometry: Geometry,
        timestamp_us: u64,
        draw: DrawFn,
    ) -> Self {
        Self {
            model,
            output_type,
            payload,
            count,
            geometry,
            timestamp_us,
            draw,
        }
    }

    pub fn model(&self) -> &ModelIdentifier {
        &self.model
    }

    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    pub fn payload(&self) -> &DecodedPayload {
        &self.payload
    }

    /// Number of records (fixed-record models) or tensors (raw-tensor models)
    /// carried on the wire.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// NPU input geometry the result coordinates refer to.
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Timestamp of the picture the inference ran on.
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// Draw onto `canvas`. Returns the number of boxes drawn.
    pub fn draw(&self, canvas: &mut dyn Canvas, req: &DrawRequest) -> usize {
        (self.draw)(self, canvas, req)
    }
}

impl fmt::Debug for DecodedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedResult")
            .field("model", &self.model)
            .field("output_type", &self.output_type)
            .field("count", &self.count)
            .field("geometry", &self.geometry)
            .field("timestamp_us", &self.timestamp_us)
            .finish_non_exhaustive()
    }
}
