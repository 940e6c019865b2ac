//! End-to-end tests of the sideband format: embed on the device, scan and
//! decode on the host, draw.

mod common;

use common::builders::{face_detect_output, instrumented_jpeg, plain_jpeg, HeaderBuilder};
use npu_uvc_link::decode::{
    DecodedPayload, DrawRequest, FaceGenderAge, FaceRect, FixedRecord, ModelRegistry,
    RecordingCanvas,
};
use npu_uvc_link::sideband::{
    extract, insert_segments, InferenceOutput, NpuTensor, SidebandError, HEADER_LEN,
    MAX_SEGMENT_PAYLOAD,
};
use npu_uvc_link::{Error, Rect};

#[test]
fn test_face_detect_end_to_end() {
    let header = HeaderBuilder::new("rockx_face_detect")
        .picture_timestamp(33_000)
        .build();
    let jpeg = instrumented_jpeg(&header, Some(&face_detect_output(30_000, &[0.9, 0.3])));

    let meta = extract(&jpeg).unwrap().expect("sideband data present");
    assert_eq!(meta.header.picture_timestamp, 33_000);
    assert_eq!(meta.header.outputs_num, 2);

    let result = ModelRegistry::with_builtin().decode(&meta).unwrap().unwrap();
    assert_eq!(result.count(), 2);
    assert!(matches!(result.payload(), DecodedPayload::Records(b) if b.len() == 40));

    // 300x300 NPU space onto a 600x600 display.
    let mut canvas = RecordingCanvas::new();
    let drawn = result.draw(&mut canvas, &DrawRequest::full(Rect::new(0, 0, 600, 600)));
    assert_eq!(drawn, 1);
    assert_eq!(canvas.rects(), vec![Rect::new(40, 80, 100, 120)]);
}

#[test]
fn test_plain_picture_has_no_metadata() {
    assert_eq!(extract(&plain_jpeg()), Ok(None));
}

#[test]
fn test_declared_size_exceeds_carried_bytes() {
    let header = HeaderBuilder::new("rockx_face_detect").build();
    let output = face_detect_output(0, &[0.9, 0.9]);
    let mut blob = npu_uvc_link::embed(&header, Some(&output)).unwrap();
    blob.truncate(blob.len() - FaceRect::LEN);
    let jpeg = insert_segments(&plain_jpeg(), &blob).unwrap();

    let err = extract(&jpeg).unwrap_err();
    assert!(matches!(err, SidebandError::SizeMismatch { .. }));
    assert!(Error::from(err).is_metadata_local());
}

#[test]
fn test_gender_age_labels() {
    let header = HeaderBuilder::new("rockx_face_gender_age").build();
    let faces = [
        FaceGenderAge {
            face: FaceRect::new(10, 60, 50, 100, 0.9),
            gender: 1,
            age: 42,
        },
        FaceGenderAge {
            face: FaceRect::new(100, 60, 150, 100, 0.99),
            gender: 0,
            age: 7,
        },
    ];
    let jpeg = instrumented_jpeg(&header, Some(&common::builders::gender_age_output(1, &faces)));
    let meta = extract(&jpeg).unwrap().unwrap();
    let result = ModelRegistry::with_builtin().decode(&meta).unwrap().unwrap();

    let mut canvas = RecordingCanvas::new();
    result.draw(&mut canvas, &DrawRequest::full(Rect::new(0, 0, 300, 300)));
    assert_eq!(
        canvas.texts(),
        vec!["Gender: Man, Age: 42", "Gender: Women, Age: 7"]
    );
}

#[test]
fn test_payload_spanning_several_segments() {
    let header = HeaderBuilder::new("rknn_ssd").geometry(640, 640).build();
    let tensors = vec![
        NpuTensor::new(0, vec![0xAB; MAX_SEGMENT_PAYLOAD]),
        NpuTensor::new(1, vec![0xCD; 4096]),
    ];
    let output = InferenceOutput::tensors(5, tensors.clone());
    let jpeg = instrumented_jpeg(&header, Some(&output));

    let meta = extract(&jpeg).unwrap().unwrap();
    assert_eq!(meta.header.outputs_num, 2);
    assert_eq!(
        meta.payload.len() + HEADER_LEN,
        meta.header.blob_len()
    );
    let records = npu_uvc_link::sideband::tensor::walk(&meta.payload, 2).unwrap();
    let recovered: Vec<NpuTensor> = records.iter().map(|r| r.to_tensor()).collect();
    assert_eq!(recovered, tensors);
}

#[test]
fn test_unregistered_tensor_model_is_unsupported() {
    let header = HeaderBuilder::new("rknn_yolo").build();
    let output = InferenceOutput::tensors(0, vec![NpuTensor::from_f32(0, &[1.0, 2.0])]);
    let meta = extract(&instrumented_jpeg(&header, Some(&output)))
        .unwrap()
        .unwrap();
    let err = ModelRegistry::with_builtin().decode(&meta).unwrap_err();
    assert!(matches!(err, Error::UnsupportedModel(_)));
}

#[test]
fn test_header_only_picture_decodes_to_nothing() {
    let header = HeaderBuilder::new("rockx_face_detect").picture_timestamp(9).build();
    let jpeg = instrumented_jpeg(&header, None);
    let meta = extract(&jpeg).unwrap().unwrap();
    assert!(!meta.has_payload());
    assert!(ModelRegistry::with_builtin().decode(&meta).unwrap().is_none());
}
