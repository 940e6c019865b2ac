//! Test data builders for sideband headers, JPEG bitstreams and face records

use npu_uvc_link::decode::{encode_records, FaceGenderAge, FaceRect};
use npu_uvc_link::sideband::{
    embed, insert_segments, InferenceOutput, ModelIdentifier, OutputType, SidebandHeader,
};
use npu_uvc_link::{Geometry, MediaBuffer};

/// Smallest bitstream the scanner accepts as a JPEG: SOI, one table
/// segment, a scan header with some entropy-coded bytes, EOI.
pub fn plain_jpeg() -> Vec<u8> {
    let mut jpeg = vec![0xFF, 0xD8];
    jpeg.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x05, 0x00, 0x10, 0x20]);
    jpeg.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02, 0x3C, 0xFF, 0x00, 0x7A]);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

/// Builder for sideband headers
pub struct HeaderBuilder {
    model: String,
    geometry: Geometry,
    picture_timestamp: u64,
}

impl HeaderBuilder {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            geometry: Geometry::new(300, 300),
            picture_timestamp: 0,
        }
    }

    pub fn geometry(mut self, width: u32, height: u32) -> Self {
        self.geometry = Geometry::new(width, height);
        self
    }

    pub fn picture_timestamp(mut self, timestamp_us: u64) -> Self {
        self.picture_timestamp = timestamp_us;
        self
    }

    pub fn build(self) -> SidebandHeader {
        SidebandHeader::new(
            ModelIdentifier::new(&self.model).unwrap(),
            OutputType::for_model(&self.model),
            self.geometry,
        )
        .with_picture_timestamp(self.picture_timestamp)
    }
}

/// Face-detect output with one record per score, boxes spaced apart.
pub fn face_detect_output(timestamp_us: u64, scores: &[f32]) -> InferenceOutput {
    let faces: Vec<FaceRect> = scores
        .iter()
        .enumerate()
        .map(|(i, score)| {
            let x = 20 + 100 * i as i32;
            FaceRect::new(x, 40, x + 50, 100, *score)
        })
        .collect();
    InferenceOutput::records(timestamp_us, faces.len() as u32, encode_records(&faces))
}

pub fn gender_age_output(timestamp_us: u64, faces: &[FaceGenderAge]) -> InferenceOutput {
    InferenceOutput::records(timestamp_us, faces.len() as u32, encode_records(faces))
}

/// JPEG with `output` embedded as sideband data.
pub fn instrumented_jpeg(header: &SidebandHeader, output: Option<&InferenceOutput>) -> Vec<u8> {
    let blob = embed(header, output).unwrap();
    insert_segments(&plain_jpeg(), &blob).unwrap()
}

/// Received-picture buffer as the UVC collaborator would deliver it.
pub fn received(bitstream: Vec<u8>, arrival_us: u64) -> MediaBuffer {
    MediaBuffer::jpeg(bitstream).with_timestamp(arrival_us)
}

/// Numbered opaque buffer for queue tests.
pub fn numbered(n: u8) -> MediaBuffer {
    MediaBuffer::new(vec![n], npu_uvc_link::BufferKind::Opaque).with_timestamp(n as u64)
}
