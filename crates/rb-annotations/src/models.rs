use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rb_core::core::{ImageId, RegionId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One drawn rectangle, normalized to `[0,1]` against the image dimensions.
///
/// Field names serialize in camelCase for compatibility with annotation
/// files written by the original web tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub id: Uuid,
    pub region_id: RegionId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Normalized rectangle input for box creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    /// Clamp into the unit square: `x,y ∈ [0,1]`, `x+width ≤ 1`,
    /// `y+height ≤ 1`.
    pub fn clamped(self) -> Self {
        let x = self.x.clamp(0.0, 1.0);
        let y = self.y.clamp(0.0, 1.0);
        Self {
            x,
            y,
            width: self.width.clamp(0.0, 1.0 - x),
            height: self.height.clamp(0.0, 1.0 - y),
        }
    }
}

/// Partial update for an existing box; `None` fields stay unchanged.
/// Deliberately does no clamping — callers clamp before calling.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoxUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// Per-image aggregate: drawn boxes in insertion order plus the skip flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnnotation {
    pub image_id: ImageId,
    pub boxes: Vec<BoundingBox>,
    pub skipped: bool,
    pub last_modified: DateTime<Utc>,
}

impl ImageAnnotation {
    pub fn empty(image_id: ImageId) -> Self {
        Self {
            image_id,
            boxes: Vec::new(),
            skipped: false,
            last_modified: Utc::now(),
        }
    }
}

pub const ANNOTATION_FILE_VERSION: &str = "1.0.0";

/// Persisted annotation file shape:
/// `{version, createdAt, updatedAt, annotations: {<imageId>: ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationFile {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub annotations: HashMap<ImageId, ImageAnnotation>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnnotationFormatError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AnnotationFile {
    pub fn new(annotations: HashMap<ImageId, ImageAnnotation>) -> Self {
        let now = Utc::now();
        Self {
            version: ANNOTATION_FILE_VERSION.to_owned(),
            created_at: now,
            updated_at: now,
            annotations,
        }
    }

    pub fn to_json(&self) -> Result<String, AnnotationFormatError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, AnnotationFormatError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_inside_unit_square_is_unchanged() {
        let rect = NormalizedRect {
            x: 0.1,
            y: 0.2,
            width: 0.3,
            height: 0.4,
        };
        assert_eq!(rect.clamped(), rect);
    }

    #[test]
    fn test_clamped_limits_extent_to_unit_square() {
        let rect = NormalizedRect {
            x: 0.8,
            y: -0.5,
            width: 0.6,
            height: 2.0,
        }
        .clamped();

        assert_eq!(rect.x, 0.8);
        assert_eq!(rect.y, 0.0);
        assert!((rect.width - 0.2).abs() < 1e-12);
        assert_eq!(rect.height, 1.0);
    }

    #[test]
    fn test_annotation_file_camel_case_keys() {
        let image_id = ImageId::new("img_0001");
        let mut annotations = HashMap::new();
        annotations.insert(
            image_id.clone(),
            ImageAnnotation {
                image_id,
                boxes: vec![BoundingBox {
                    id: Uuid::new_v4(),
                    region_id: RegionId::new("region-1"),
                    x: 0.1,
                    y: 0.2,
                    width: 0.3,
                    height: 0.4,
                }],
                skipped: false,
                last_modified: Utc::now(),
            },
        );

        let json = AnnotationFile::new(annotations).to_json().unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"updatedAt\""));
        assert!(json.contains("\"imageId\""));
        assert!(json.contains("\"lastModified\""));
        assert!(json.contains("\"regionId\""));
        assert!(!json.contains("\"region_id\""));
    }

    #[test]
    fn test_annotation_file_roundtrip() {
        let image_id = ImageId::new("img_0001");
        let mut annotations = HashMap::new();
        annotations.insert(image_id.clone(), ImageAnnotation::empty(image_id.clone()));

        let file = AnnotationFile::new(annotations);
        let parsed = AnnotationFile::from_json(&file.to_json().unwrap()).unwrap();

        assert_eq!(parsed.version, ANNOTATION_FILE_VERSION);
        assert_eq!(parsed.annotations.len(), 1);
        assert!(parsed.annotations.contains_key(&image_id));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(AnnotationFile::from_json("not json").is_err());
    }
}
