//! `tagpose-types` – shared data model for the vision localisation stack.
//!
//! # Modules
//!
//! - [`geometry`] – poses, transforms and rotations in field coordinates.
//! - [`layout`] – [`TagLayout`][layout::TagLayout]: the fixed field placement
//!   of every fiducial tag.
//!
//! The crate root holds the per-tick records that flow through the pipeline:
//! [`DetectionResult`] → [`PoseCandidate`] → [`PoseEstimate`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod geometry;
pub mod layout;

pub use geometry::{Pose2d, Pose3d, Rotation2d, Rotation3d, Transform3d, Translation2d, Translation3d};
pub use layout::TagLayout;

/// Identifier printed on a fiducial tag.
pub type FiducialId = u32;

/// Ambiguity value reported when the detector did not compute one.
pub const AMBIGUITY_UNKNOWN: f64 = -1.0;

// ────────────────────────────────────────────────────────────────────────────
// Camera configuration
// ────────────────────────────────────────────────────────────────────────────

/// Identity and mounting of one physical or simulated camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera name as known to the detection pipeline, e.g. `"front"`.
    pub name: String,
    /// Transform from the robot origin to the camera optical centre.
    pub robot_to_camera: Transform3d,
}

impl CameraConfig {
    pub fn new(name: impl Into<String>, robot_to_camera: Transform3d) -> Self {
        Self {
            name: name.into(),
            robot_to_camera,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Detection records
// ────────────────────────────────────────────────────────────────────────────

/// One fiducial tag observed in a camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub fiducial_id: FiducialId,
    /// Pose ambiguity ratio in `[0, 1]`, or [`AMBIGUITY_UNKNOWN`].
    pub ambiguity: f64,
    /// Lowest-reprojection-error camera → tag solution.
    pub best_camera_to_target: Transform3d,
    /// Second-best (mirrored) camera → tag solution.
    pub alt_camera_to_target: Transform3d,
    /// Horizontal angle to the tag centre (radians, positive left).
    pub yaw: f64,
    /// Vertical angle to the tag centre (radians, positive up).
    pub pitch: f64,
    /// Fraction of the image covered by the tag, `[0, 1]`.
    pub area: f64,
}

impl Target {
    /// Minimal target with identity solutions; convenient for callers that
    /// only care about identity and ambiguity.
    pub fn new(fiducial_id: FiducialId, ambiguity: f64) -> Self {
        Self {
            fiducial_id,
            ambiguity,
            best_camera_to_target: Transform3d::identity(),
            alt_camera_to_target: Transform3d::identity(),
            yaw: 0.0,
            pitch: 0.0,
            area: 0.0,
        }
    }

    pub fn with_camera_to_target(mut self, best: Transform3d) -> Self {
        self.best_camera_to_target = best;
        self.alt_camera_to_target = best;
        self
    }

    pub fn has_ambiguity(&self) -> bool {
        self.ambiguity >= 0.0
    }
}

/// Multi-target solution computed by the detection co-processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTagResult {
    /// Field origin → camera optical centre.
    pub field_to_camera: Transform3d,
    /// Mean reprojection error of the solution (pixels).
    pub reprojection_error: f64,
    pub fiducial_ids_used: Vec<FiducialId>,
}

/// Latest output of a camera's detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Capture time of the frame (seconds, pipeline clock).
    pub timestamp_seconds: f64,
    /// Pipeline latency that was subtracted to obtain the capture time.
    pub latency_millis: f64,
    pub targets: Vec<Target>,
    pub multi_tag: Option<MultiTagResult>,
}

impl DetectionResult {
    /// A result with no observations.
    pub fn empty(timestamp_seconds: f64) -> Self {
        Self {
            timestamp_seconds,
            latency_millis: 0.0,
            targets: Vec::new(),
            multi_tag: None,
        }
    }

    pub fn with_targets(timestamp_seconds: f64, targets: Vec<Target>) -> Self {
        Self {
            targets,
            ..Self::empty(timestamp_seconds)
        }
    }

    pub fn has_targets(&self) -> bool {
        !self.targets.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Estimation output
// ────────────────────────────────────────────────────────────────────────────

/// How a [`PoseCandidate`] was computed from a [`DetectionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseStrategy {
    /// Use the co-processor's multi-target solution as-is.
    MultiTagOnCoprocessor,
    /// Single target with the lowest ambiguity ratio.
    LowestAmbiguity,
    /// Single target whose solution puts the camera closest to its mounted
    /// height.
    ClosestToCameraHeight,
    /// Ambiguity-weighted average of every resolvable single-target solution.
    AverageBestTargets,
}

/// A robot pose estimate derived from one camera for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseCandidate {
    pub pose: Pose3d,
    pub timestamp_seconds: f64,
    /// Fiducials that contributed to the estimate.
    pub targets_used: Vec<FiducialId>,
    pub strategy: PoseStrategy,
}

/// Per-axis standard deviations (x and y in metres, heading in radians).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceVector {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl ConfidenceVector {
    /// Infinite-variance sentinel: the sample should be discarded.
    pub const UNUSABLE: ConfidenceVector = ConfidenceVector {
        x: f64::MAX,
        y: f64::MAX,
        heading: f64::MAX,
    };

    pub const fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// Component-wise scale.
    pub fn scaled(&self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.heading * k)
    }

    pub fn is_usable(&self) -> bool {
        *self != Self::UNUSABLE
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.heading]
    }
}

/// The unit handed to the downstream state estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    /// Name of the camera the estimate came from.
    pub camera: String,
    pub candidate: PoseCandidate,
    pub std_devs: ConfidenceVector,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Errors raised while loading or wiring the vision stack.
///
/// The per-tick estimation path never returns these; it degrades to "no
/// estimate this tick" instead.
#[derive(Error, Debug)]
pub enum VisionError {
    #[error("Failed to read tag layout at {path}: {details}")]
    LayoutRead { path: String, details: String },

    #[error("Invalid tag layout: {0}")]
    LayoutParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Simulation mode requested but this build has no simulation support")]
    SimulationUnavailable,

    #[error("Camera '{camera}' unavailable: {details}")]
    CameraUnavailable { camera: String, details: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_sentinel_is_not_usable() {
        assert!(!ConfidenceVector::UNUSABLE.is_usable());
        assert!(ConfidenceVector::new(1.0, 1.0, 2.0).is_usable());
    }

    #[test]
    fn scaled_multiplies_each_component() {
        let v = ConfidenceVector::new(4.0, 4.0, 8.0).scaled(0.5);
        assert_eq!(v.as_array(), [2.0, 2.0, 4.0]);
    }

    #[test]
    fn empty_result_has_no_targets() {
        let r = DetectionResult::empty(1.5);
        assert!(!r.has_targets());
        assert!(r.multi_tag.is_none());
    }

    #[test]
    fn unknown_ambiguity_is_flagged() {
        assert!(!Target::new(1, AMBIGUITY_UNKNOWN).has_ambiguity());
        assert!(Target::new(1, 0.0).has_ambiguity());
    }

    #[test]
    fn strategy_serializes_snake_case() {
        let json = serde_json::to_string(&PoseStrategy::LowestAmbiguity).unwrap();
        assert_eq!(json, "\"lowest_ambiguity\"");
    }

    #[test]
    fn vision_error_display() {
        let err = VisionError::CameraUnavailable {
            camera: "front".to_string(),
            details: "disconnected".to_string(),
        };
        assert!(err.to_string().contains("front"));
        assert!(VisionError::SimulationUnavailable.to_string().contains("simulation"));
    }
}
