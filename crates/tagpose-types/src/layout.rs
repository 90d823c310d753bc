//! [`TagLayout`] – known field placement of every fiducial tag.
//!
//! Loaded once at process start and shared read-only (usually behind an
//! `Arc`) by every estimator and by the simulation backdrop.
//!
//! The on-disk format is the standard field-layout JSON document:
//!
//! ```json
//! {
//!   "tags": [
//!     { "ID": 1,
//!       "pose": {
//!         "translation": { "x": 15.08, "y": 0.25, "z": 1.36 },
//!         "rotation": { "quaternion": { "W": 0.5, "X": 0.0, "Y": 0.0, "Z": 0.866 } }
//!       } }
//!   ],
//!   "field": { "length": 16.54, "width": 8.21 }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geometry::{Pose3d, Rotation3d, Translation3d};
use crate::{FiducialId, VisionError};

const SAMPLE_FIELD_JSON: &str = include_str!("layouts/sample_field.json");

/// Immutable mapping from fiducial id to its pose in field coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagLayout {
    field_length: f64,
    field_width: f64,
    tags: BTreeMap<FiducialId, Pose3d>,
}

impl TagLayout {
    /// Build a layout from already-known tag poses.
    pub fn new(
        field_length: f64,
        field_width: f64,
        tags: impl IntoIterator<Item = (FiducialId, Pose3d)>,
    ) -> Self {
        Self {
            field_length,
            field_width,
            tags: tags.into_iter().collect(),
        }
    }

    /// Parse a field-layout JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::LayoutParse`] if the document is malformed.
    pub fn from_json_str(raw: &str) -> Result<Self, VisionError> {
        let doc: LayoutDocument =
            serde_json::from_str(raw).map_err(|e| VisionError::LayoutParse(e.to_string()))?;
        Ok(doc.into())
    }

    /// Read and parse a field-layout JSON file.
    ///
    /// # Errors
    ///
    /// [`VisionError::LayoutRead`] when the file cannot be read,
    /// [`VisionError::LayoutParse`] when its contents are malformed.
    pub fn from_path(path: &Path) -> Result<Self, VisionError> {
        let raw = std::fs::read_to_string(path).map_err(|e| VisionError::LayoutRead {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    /// The embedded sample field used when no layout file is configured.
    pub fn sample_field() -> Self {
        // The embedded document is part of the build; a parse failure here is
        // a packaging bug, so fall back to an empty field rather than panic.
        Self::from_json_str(SAMPLE_FIELD_JSON).unwrap_or_else(|e| {
            tracing::error!(error = %e, "embedded sample field layout is invalid");
            Self::default()
        })
    }

    /// Known pose of tag `id`, or `None` for an id absent from the field.
    pub fn tag_pose(&self, id: FiducialId) -> Option<Pose3d> {
        self.tags.get(&id).copied()
    }

    /// Iterate over `(id, pose)` pairs in ascending id order.
    pub fn tags(&self) -> impl Iterator<Item = (FiducialId, &Pose3d)> {
        self.tags.iter().map(|(id, pose)| (*id, pose))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn field_length(&self) -> f64 {
        self.field_length
    }

    pub fn field_width(&self) -> f64 {
        self.field_width
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JSON document shape
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct LayoutDocument {
    tags: Vec<TagEntry>,
    field: FieldDimensions,
}

#[derive(Debug, Serialize, Deserialize)]
struct TagEntry {
    #[serde(rename = "ID")]
    id: FiducialId,
    pose: PoseEntry,
}

#[derive(Debug, Serialize, Deserialize)]
struct PoseEntry {
    translation: Translation3d,
    rotation: RotationEntry,
}

#[derive(Debug, Serialize, Deserialize)]
struct RotationEntry {
    quaternion: QuaternionEntry,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct QuaternionEntry {
    w: f64,
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldDimensions {
    length: f64,
    width: f64,
}

impl From<LayoutDocument> for TagLayout {
    fn from(doc: LayoutDocument) -> Self {
        let tags = doc.tags.into_iter().map(|t| {
            let q = t.pose.rotation.quaternion;
            (
                t.id,
                Pose3d::new(
                    t.pose.translation,
                    Rotation3d::from_quaternion(q.w, q.x, q.y, q.z),
                ),
            )
        });
        TagLayout::new(doc.field.length, doc.field.width, tags)
    }
}
