//! Fixed-size result records of the built-in face models.
//!
//! `rockx_face_detect` carries `left, top, right, bottom: i32, score: f32`
//! (20 bytes). `rockx_face_gender_age` appends `gender: u8, age: u8` and two
//! reserved bytes (24 bytes). All fields are little-endian.

use crate::sideband::{read_f32, read_i32, read_u8, SidebandError, SidebandResult};
use crate::types::Rect;

/// A record type with a fixed wire size.
pub trait FixedRecord: Sized {
    const LEN: usize;

    /// Decode from exactly `LEN` bytes.
    fn read(bytes: &[u8]) -> Option<Self>;

    fn write_to(&self, out: &mut Vec<u8>);
}

/// Decode `count` records from `payload`, which must hold exactly that many.
pub fn parse_records<T: FixedRecord>(payload: &[u8], count: u32) -> SidebandResult<Vec<T>> {
    let expected = (count as usize).saturating_mul(T::LEN);
    if payload.len() != expected {
        return Err(SidebandError::SizeMismatch {
            declared: expected,
            actual: payload.len(),
        });
    }
    payload
        .chunks_exact(T::LEN)
        .enumerate()
        .map(|(index, chunk)| {
            T::read(chunk).ok_or(SidebandError::TruncatedRecord {
                index,
                offset: index * T::LEN,
            })
        })
        .collect()
}

/// Encode records back to back.
pub fn encode_records<T: FixedRecord>(records: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * T::LEN);
    for record in records {
        record.write_to(&mut out);
    }
    out
}

/// Face bounding box in NPU input coordinates with its detection score.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub score: f32,
}

impl FaceRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32, score: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
            score,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_ltrb(self.left, self.top, self.right, self.bottom)
    }
}

impl FixedRecord for FaceRect {
    const LEN: usize = 20;

    fn read(bytes: &[u8]) -> Option<Self> {
        let mut cursor = 0;
        Some(Self {
            left: read_i32(bytes, &mut cursor)?,
            top: read_i32(bytes, &mut cursor)?,
            right: read_i32(bytes, &mut cursor)?,
            bottom: read_i32(bytes, &mut cursor)?,
            score: read_f32(bytes, &mut cursor)?,
        })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.left.to_le_bytes());
        out.extend_from_slice(&self.top.to_le_bytes());
        out.extend_from_slice(&self.right.to_le_bytes());
        out.extend_from_slice(&self.bottom.to_le_bytes());
        out.extend_from_slice(&self.score.to_le_bytes());
    }
}

/// Face box plus estimated gender (non-zero = man) and age.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaceGenderAge {
    pub face: FaceRect,
    pub gender: u8,
    pub age: u8,
}

impl FaceGenderAge {
    pub fn is_man(&self) -> bool {
        self.gender != 0
    }

    /// Overlay label, e.g. `Gender: Man, Age: 31`.
    pub fn label(&self) -> String {
        let gender = if self.is_man() { "Man" } else { "Women" };
        format!("Gender: {}, Age: {}", gender, self.age)
    }
}

impl FixedRecord for FaceGenderAge {
    const LEN: usize = 24;

    fn read(bytes: &[u8]) -> Option<Self> {
        let mut cursor = FaceRect::LEN;
        Some(Self {
            face: FaceRect::read(bytes.get(..FaceRect::LEN)?)?,
            gender: read_u8(bytes, &mut cursor)?,
            age: read_u8(bytes, &mut cursor)?,
        })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        self.face.write_to(out);
        out.extend_from_slice(&[self.gender, self.age, 0, 0]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_rect_layout() {
        let bytes = encode_records(&[FaceRect::new(1, 2, 3, 4, 0.5)]);
        assert_eq!(bytes.len(), FaceRect::LEN);
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[16..20], &0.5f32.to_le_bytes());
    }

    #[test]
    fn test_gender_age_layout_and_label() {
        let rec = FaceGenderAge {
            face: FaceRect::new(-5, 0, 10, 20, 0.9),
            gender: 1,
            age: 31,
        };
        let bytes = encode_records(&[rec]);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[20..24], &[1, 31, 0, 0]);
        let parsed: Vec<FaceGenderAge> = parse_records(&bytes, 1).unwrap();
        assert_eq!(parsed[0], rec);
        assert_eq!(rec.label(), "Gender: Man, Age: 31");
        let woman = FaceGenderAge { gender: 0, ..rec };
        assert_eq!(woman.label(), "Gender: Women, Age: 31");
    }

    #[test]
    fn test_count_mismatch() {
        let bytes = encode_records(&[FaceRect::default(), FaceRect::default()]);
        assert_eq!(
            parse_records::<FaceRect>(&bytes, 3),
            Err(SidebandError::SizeMismatch {
                declared: 60,
                actual: 40
            })
        );
    }

    #[test]
    fn test_rect_from_corners() {
        let face = FaceRect::new(30, 60, 90, 150, 1.0);
        assert_eq!(face.rect(), Rect::new(30, 60, 60, 90));
    }

    #[test]
    fn test_extreme_corners_saturate() {
        let wide = FaceRect::new(-2, 0, i32::MAX, 10, 0.9);
        assert_eq!(wide.rect(), Rect::new(-2, 0, i32::MAX, 10));
        let inverted = FaceRect::new(i32::MAX, i32::MAX, i32::MIN, i32::MIN, 0.9);
        assert_eq!(inverted.rect(), Rect::new(i32::MAX, i32::MAX, i32::MIN, i32::MIN));
        assert!(inverted.rect().is_empty());

        let rec = FaceGenderAge {
            face: FaceRect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX, 1.0),
            gender: 0,
            age: u8::MAX,
        };
        let parsed: Vec<FaceGenderAge> = parse_records(&encode_records(&[rec]), 1).unwrap();
        assert_eq!(parsed[0], rec);
        assert_eq!(parsed[0].face.rect().w, i32::MAX);
    }
}
