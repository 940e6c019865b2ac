//! Device side: serialize a header plus inference output into one blob.

use super::header::{OutputType, SidebandHeader, HEADER_LEN};
use super::tensor::NpuTensor;
use super::SidebandError;
use crate::buffer::reserve;
use crate::error::{Error, Result};

/// Inference output produced for one picture.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    /// Capture timestamp of the picture the inference ran on.
    pub timestamp_us: u64,
    pub payload: InferencePayload,
}

/// Payload variants matching [`OutputType`].
#[derive(Debug, Clone, PartialEq)]
pub enum InferencePayload {
    /// Raw tensors, post-processed on the host.
    Tensors(Vec<NpuTensor>),
    /// `count` fixed-size records already in final form.
    Records { count: u32, bytes: Vec<u8> },
}

impl InferenceOutput {
    pub fn tensors(timestamp_us: u64, tensors: Vec<NpuTensor>) -> Self {
        Self {
            timestamp_us,
            payload: InferencePayload::Tensors(tensors),
        }
    }

    pub fn records(timestamp_us: u64, count: u32, bytes: Vec<u8>) -> Self {
        Self {
            timestamp_us,
            payload: InferencePayload::Records { count, bytes },
        }
    }

    pub fn output_type(&self) -> OutputType {
        match self.payload {
            InferencePayload::Tensors(_) => OutputType::RawTensor,
            InferencePayload::Records { .. } => OutputType::FixedRecord,
        }
    }

    /// `(npu_output_size, npu_outputs_num)` for this payload.
    fn sizes(&self) -> std::result::Result<(u32, u32), SidebandError> {
        let (len, num) = match &self.payload {
            InferencePayload::Tensors(tensors) => (
                tensors.iter().map(NpuTensor::encoded_len).sum::<usize>(),
                tensors.len(),
            ),
            InferencePayload::Records { count, bytes } => (bytes.len(), *count as usize),
        };
        let size = u32::try_from(len).map_err(|_| SidebandError::BlobTooLarge { len })?;
        let num = u32::try_from(num).map_err(|_| SidebandError::BlobTooLarge { len })?;
        Ok((size, num))
    }
}

/// Serialize `header` and `output` into a contiguous blob.
///
/// The payload fields of `header` (`outputs_timestamp`, `output_size`,
/// `outputs_num`) are recomputed from `output`. Without an output the blob
/// is header-only: a marker segment cannot be empty, so a picture without
/// inference data still carries a valid header.
pub fn embed(header: &SidebandHeader, output: Option<&InferenceOutput>) -> Result<Vec<u8>> {
    embed_with(header, output, reserve)
}

/// [`embed`] with the blob storage obtained from `alloc`, which receives the
/// total blob length. Header-only blobs do not allocate through it.
pub fn embed_with(
    header: &SidebandHeader,
    output: Option<&InferenceOutput>,
    alloc: impl FnOnce(usize) -> Result<Vec<u8>>,
) -> Result<Vec<u8>> {
    let mut header = *header;
    let Some(output) = output else {
        header.outputs_timestamp = 0;
        header.output_size = 0;
        header.outputs_num = 0;
        return Ok(header.to_bytes());
    };

    if output.output_type() != header.output_type {
        return Err(Error::Config(format!(
            "model '{}' expects {:?} output but inference produced {:?}",
            header.model,
            header.output_type,
            output.output_type()
        )));
    }

    let (size, num) = output.sizes()?;
    header.outputs_timestamp = output.timestamp_us;
    header.output_size = size;
    header.outputs_num = num;

    let mut blob = alloc(header.blob_len())?;
    header.write_to(&mut blob);
    match &output.payload {
        InferencePayload::Tensors(tensors) => {
            for tensor in tensors {
                tensor.write_to(&mut blob)?;
            }
        }
        InferencePayload::Records { bytes, .. } => blob.extend_from_slice(bytes),
    }
    debug_assert_eq!(blob.len(), HEADER_LEN + size as usize);
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sideband::header::ModelIdentifier;
    use crate::types::Geometry;

    fn template(model: &str) -> SidebandHeader {
        SidebandHeader::new(
            ModelIdentifier::new(model).unwrap(),
            OutputType::for_model(model),
            Geometry::new(300, 300),
        )
        .with_picture_timestamp(1_000)
    }

    #[test]
    fn test_header_only_blob() {
        let mut header = template("rockx_face_detect");
        header.output_size = 99;
        let blob = embed(&header, None).unwrap();
        assert_eq!(blob.len(), HEADER_LEN);
        let parsed = SidebandHeader::parse(&blob).unwrap();
        assert_eq!(parsed.output_size, 0);
        assert_eq!(parsed.outputs_num, 0);
        assert_eq!(parsed.picture_timestamp, 1_000);
    }

    #[test]
    fn test_tensor_sizes() {
        let output = InferenceOutput::tensors(
            7,
            vec![NpuTensor::new(0, vec![0; 16]), NpuTensor::new(1, vec![0; 4])],
        );
        let blob = embed(&template("rknn_ssd"), Some(&output)).unwrap();
        let header = SidebandHeader::parse(&blob).unwrap();
        assert_eq!(header.output_size, 2 * 10 + 20);
        assert_eq!(header.outputs_num, 2);
        assert_eq!(header.outputs_timestamp, 7);
        assert_eq!(blob.len(), header.blob_len());
    }

    #[test]
    fn test_records_copied_verbatim() {
        let bytes: Vec<u8> = (0..40).collect();
        let output = InferenceOutput::records(3, 2, bytes.clone());
        let blob = embed(&template("rockx_face_detect"), Some(&output)).unwrap();
        assert_eq!(&blob[HEADER_LEN..], bytes.as_slice());
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        let output = InferenceOutput::records(3, 2, vec![0; 40]);
        let mut asked = 0;
        let err = embed_with(&template("rockx_face_detect"), Some(&output), |len| {
            asked = len;
            reserve(usize::MAX)
        })
        .unwrap_err();
        assert_eq!(asked, HEADER_LEN + 40);
        assert!(matches!(err, Error::Allocation { requested: usize::MAX }));
        assert!(!err.is_metadata_local());
    }

    #[test]
    fn test_header_only_skips_allocator() {
        let blob = embed_with(&template("rockx_face_detect"), None, |requested| {
            Err(Error::Allocation { requested })
        })
        .unwrap();
        assert_eq!(blob.len(), HEADER_LEN);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let output = InferenceOutput::records(3, 0, Vec::new());
        let err = embed(&template("rknn_ssd"), Some(&output)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
