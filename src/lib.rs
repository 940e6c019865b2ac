//! # npu-uvc-link: NPU results over UVC, inside the JPEG
//!
//! A camera device runs a neural network on every picture and streams the
//! pictures to a host as JPEG over USB video. The inference results travel
//! inside the same JPEG, as APP2 marker segments, so they survive the
//! hardware encode/decode round trip and arrive already paired with the
//! picture they describe.
//!
//! ## Architecture
//!
//! - **Pipeline**: a dataflow graph of nodes ("flows"), one worker thread per
//!   node, bounded drop-oldest or blocking input queues, fan-out edges
//! - **Sideband**: the binary header/payload format and the APP2 segment
//!   writer and scanner
//! - **Decode**: model registry, decoded results and overlay drawing
//! - **Communication**: crossbeam channels at the graph boundary
//!
//! ## Example
//!
//! ```ignore
//! use npu_uvc_link::{
//!     decode::ModelRegistry,
//!     pipeline::{nodes::{ComposeFlow, ExtractFlow, JpegPassthrough, RecordingRenderSink}, Graph},
//!     types::{Rect, Rotation},
//! };
//! use std::sync::Arc;
//!
//! let graph = Graph::new();
//! let registry = Arc::new(ModelRegistry::with_builtin());
//! let extract = graph.install("extract", ExtractFlow::new(registry, JpegPassthrough).slot_map(2))?;
//! let sink = RecordingRenderSink::new(Rect::new(0, 0, 1280, 720));
//! let compose = graph.install("compose", ComposeFlow::new(sink, Rotation::Deg0).slot_map(2, 1))?;
//! graph.connect(extract, 0, compose, 0)?;
//! graph.connect(extract, 1, compose, 1)?;
//! graph.send(extract, 0, received_jpeg)?;
//! ```

pub mod buffer;
pub mod config;
pub mod decode;
pub mod error;
pub mod pipeline;
pub mod sideband;
pub mod types;

// Re-export commonly used types
pub use buffer::{BufferKind, MediaBuffer, PixelFormat};
pub use config::{AppConfig, ModelSelection};
pub use decode::{DecodedResult, ModelRegistry};
pub use error::{Error, Result, ResultExt};
pub use pipeline::{Graph, NodeId, SlotMap};
pub use sideband::{embed, extract, SidebandError, SidebandHeader};
pub use types::{Geometry, Rect, Rotation};
