//! Model name → decoder table.

use super::records::{FaceGenderAge, FaceRect, FixedRecord};
use super::render::{draw_detections, draw_face_detect, draw_face_gender_age, DrawFn};
use super::{DecodedPayload, DecodedResult, DetectionSet};
use crate::error::{Error, Result, ResultExt};
use crate::sideband::tensor::walk;
use crate::sideband::{ExtractedMetadata, OutputType, SidebandError, TensorRecord};
use crate::types::Geometry;
use std::collections::HashMap;
use std::sync::Arc;

/// Post-processing of raw NPU tensors into detections (e.g. SSD box decode).
pub type TensorPostProcess =
    Arc<dyn Fn(&[TensorRecord<'_>], Geometry) -> anyhow::Result<DetectionSet> + Send + Sync>;

#[derive(Clone)]
enum ModelEntry {
    Fixed { record_len: usize, draw: DrawFn },
    Tensor { post_process: TensorPostProcess, draw: DrawFn },
}

impl ModelEntry {
    fn output_type(&self) -> OutputType {
        match self {
            ModelEntry::Fixed { .. } => OutputType::FixedRecord,
            ModelEntry::Tensor { .. } => OutputType::RawTensor,
        }
    }
}

/// Explicit table of the models a host knows how to decode.
///
/// Built once at startup and shared by reference with the flows that decode.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelEntry>,
}

impl ModelRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in fixed-record face models.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register_fixed_model("rockx_face_detect", FaceRect::LEN, draw_face_detect);
        registry.register_fixed_model(
            "rockx_face_gender_age",
            FaceGenderAge::LEN,
            draw_face_gender_age,
        );
        registry
    }

    /// Register a model whose payload is `count` records of `record_len` bytes.
    pub fn register_fixed_model(&mut self, name: &str, record_len: usize, draw: DrawFn) {
        tracing::debug!("Registered fixed-record model {}", name);
        self.models
            .insert(name.to_string(), ModelEntry::Fixed { record_len, draw });
    }

    /// Register a raw-tensor model with its post-processor.
    pub fn register_tensor_model(&mut self, name: &str, post_process: TensorPostProcess) {
        tracing::debug!("Registered raw-tensor model {}", name);
        self.models.insert(
            name.to_string(),
            ModelEntry::Tensor {
                post_process,
                draw: draw_detections,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Decode validated sideband data.
    ///
    /// Returns `Ok(None)` when the picture carries a header but no result.
    /// Unknown models and payloads inconsistent with the model fail with a
    /// metadata-local error; the caller drops the metadata, not the picture.
    pub fn decode(&self, meta: &ExtractedMetadata) -> Result<Option<DecodedResult>> {
        let header = &meta.header;
        if header.output_size == 0 || header.output_type == OutputType::None {
            return Ok(None);
        }
        let name = header.model.name();
        let entry = self
            .models
            .get(name.as_ref())
            .ok_or_else(|| Error::UnsupportedModel(name.to_string()))?;
        if entry.output_type() != header.output_type {
            return Err(Error::UnsupportedModel(format!(
                "{} registered for {:?}, received {:?}",
                name,
                entry.output_type(),
                header.output_type
            )));
        }

        let (payload, draw) = match entry {
            ModelEntry::Fixed { record_len, draw } => {
                let expected = (header.outputs_num as usize).saturating_mul(*record_len);
                if meta.payload.len() != expected {
                    return Err(SidebandError::SizeMismatch {
                        declared: expected,
                        actual: meta.payload.len(),
                    }
                    .into());
                }
                (DecodedPayload::Records(meta.payload.clone()), *draw)
            }
            ModelEntry::Tensor { post_process, draw } => {
                let records = walk(&meta.payload, header.outputs_num)?;
                let set = post_process(records.as_slice(), header.geometry)
                    .with_context(|| format!("{} post-process", name))?;
                (DecodedPayload::Detections(set), *draw)
            }
        };

        Ok(Some(DecodedResult::new(
            header.model,
            header.output_type,
            payload,
            header.outputs_num,
            header.geometry,
            header.outputs_timestamp,
            draw,
        )))
    }
}
