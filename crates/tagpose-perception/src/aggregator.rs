//! [`Vision`] – multi-camera pose aggregation.
//!
//! Holds one [`CameraUnit`] per configured camera (config + source +
//! estimator, each independent) and, once per tick, turns every camera's
//! latest detections into a [`PoseEstimate`].  Cameras that produce no
//! candidate contribute nothing; the output order is not significant.

use rayon::prelude::*;
use tagpose_hal::CameraSource;
use tagpose_types::{CameraConfig, Pose2d, PoseEstimate};
use tracing::{debug, warn};

use crate::confidence::ConfidenceEstimator;
use crate::estimator::PoseEstimator;

/// Receives the robot pose for field display.
pub trait FieldSink {
    fn set_robot_pose(&mut self, pose: Pose2d);
}

/// One camera's slice of the pipeline.
pub struct CameraUnit {
    config: CameraConfig,
    source: Box<dyn CameraSource>,
    estimator: PoseEstimator,
}

impl CameraUnit {
    pub fn new(config: CameraConfig, source: Box<dyn CameraSource>, estimator: PoseEstimator) -> Self {
        Self {
            config,
            source,
            estimator,
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    /// Poll the source and run estimation + confidence for this tick.
    fn evaluate(&mut self, confidence: &ConfidenceEstimator) -> Option<PoseEstimate> {
        let result = match self.source.latest_result() {
            Ok(r) => r,
            Err(e) => {
                warn!(camera = %self.config.name, error = %e, "camera source failed; skipping this tick");
                return None;
            }
        };
        let Some(candidate) = self.estimator.update(&result) else {
            debug!(camera = %self.config.name, targets = result.targets.len(), "no pose candidate");
            return None;
        };
        let std_devs = confidence.estimate(&candidate.pose.to_pose2d(), &result);
        if !std_devs.is_usable() {
            debug!(camera = %self.config.name, "estimate flagged unusable");
        }
        Some(PoseEstimate {
            camera: self.config.name.clone(),
            candidate,
            std_devs,
        })
    }
}

/// Multi-camera aggregator.
pub struct Vision {
    cameras: Vec<CameraUnit>,
    confidence: ConfidenceEstimator,
}

impl Vision {
    pub fn new(confidence: ConfidenceEstimator) -> Self {
        Self {
            cameras: Vec::new(),
            confidence,
        }
    }

    pub fn add_camera(&mut self, unit: CameraUnit) {
        self.cameras.push(unit);
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    pub fn cameras(&self) -> impl Iterator<Item = &CameraUnit> {
        self.cameras.iter()
    }

    pub fn confidence(&self) -> &ConfidenceEstimator {
        &self.confidence
    }

    /// Every pose estimate available this tick, one camera at a time.
    pub fn estimated_global_poses(&mut self) -> Vec<PoseEstimate> {
        let confidence = &self.confidence;
        self.cameras
            .iter_mut()
            .filter_map(|unit| unit.evaluate(confidence))
            .collect()
    }

    /// Same as [`estimated_global_poses`][Self::estimated_global_poses] with
    /// cameras evaluated concurrently.  Output order is unspecified.
    pub fn estimated_global_poses_parallel(&mut self) -> Vec<PoseEstimate> {
        let confidence = &self.confidence;
        self.cameras
            .par_iter_mut()
            .filter_map(|unit| unit.evaluate(confidence))
            .collect()
    }

    /// Show the first estimate of the tick on `sink`.
    ///
    /// Returns `false` when there was nothing to show.
    pub fn publish_first(estimates: &[PoseEstimate], sink: &mut dyn FieldSink) -> bool {
        match estimates.first() {
            Some(first) => {
                sink.set_robot_pose(first.candidate.pose.to_pose2d());
                true
            }
            None => false,
        }
    }
}
