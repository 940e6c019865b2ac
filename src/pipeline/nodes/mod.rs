//! Built-in flows.
//!
//! Device side: `InferenceFlow` → (`OverlayFlow`) → `EmbedFlow`, wired from
//! the config by [`DevicePipeline`].
//! Host side: `ExtractFlow` → `ComposeFlow`.
//!
//! Each flow is a plain struct turned into a [`SlotMap`](super::SlotMap) by
//! its `slot_map` method; hardware stages are trait-object collaborators.

pub mod compose;
pub mod device;
pub mod embed;
pub mod extract;
pub mod inference;
pub mod overlay;

pub use compose::{letterbox, ComposeFlow, ComposedFrame, RecordingRenderSink, RenderSink};
pub use device::DevicePipeline;
pub use embed::{EmbedFlow, JpegSpliceEncoder, PictureEncoder};
pub use extract::{ExtractFlow, JpegPassthrough, PictureDecoder};
pub use inference::{InferenceEngine, InferenceFlow};
pub use overlay::OverlayFlow;
