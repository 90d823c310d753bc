//! Adaptive standard deviations for vision pose estimates.
//!
//! The downstream state estimator weights each vision sample by a per-axis
//! standard deviation.  [`ConfidenceEstimator`] derives that vector from how
//! many known tags were seen and how far they were from the estimated pose:
//!
//! ```text
//! n      = number of targets whose id is in the tag layout
//! d̄      = mean planar distance from those tags to the pose
//! base   = multi_tag if n > 1 else single_tag
//! result = base                         if n == 0
//!        = UNUSABLE                     if n == 1 and d̄ > max_single_tag_distance
//!        = base × (1 + d̄² / divisor)    otherwise
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tagpose_perception::confidence::{ConfidenceConfig, ConfidenceEstimator};
//! use tagpose_types::{DetectionResult, Pose2d, TagLayout, Target};
//!
//! let layout = Arc::new(TagLayout::sample_field());
//! let estimator = ConfidenceEstimator::new(layout, ConfidenceConfig::default());
//!
//! // Tag 7 sits at (-0.04, 5.55); stand 2 m in front of it.
//! let pose = Pose2d::from_xy_heading(1.96, 5.55, std::f64::consts::PI);
//! let result = DetectionResult::with_targets(0.0, vec![Target::new(7, 0.1)]);
//! let std_devs = estimator.estimate(&pose, &result);
//! assert!((std_devs.x - 4.0 * (1.0 + 4.0 / 30.0)).abs() < 1e-9);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tagpose_types::{ConfidenceVector, DetectionResult, Pose2d, TagLayout};
use tracing::debug;

/// Tunable constants of the confidence model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Baseline when exactly one known tag is visible.
    pub single_tag: ConfidenceVector,
    /// Baseline when two or more known tags are visible.
    pub multi_tag: ConfidenceVector,
    /// Single-tag estimates farther than this (metres) are unusable.
    pub max_single_tag_distance: f64,
    /// Divisor of the quadratic distance penalty.
    pub distance_divisor: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            single_tag: ConfidenceVector::new(4.0, 4.0, 8.0),
            multi_tag: ConfidenceVector::new(0.9, 0.9, 4.0),
            max_single_tag_distance: 4.0,
            distance_divisor: 30.0,
        }
    }
}

impl ConfidenceConfig {
    /// Check that every constant is usable by [`ConfidenceEstimator`].
    ///
    /// # Errors
    ///
    /// Returns a description of the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [("single_tag", &self.single_tag), ("multi_tag", &self.multi_tag)] {
            if v.as_array().iter().any(|c| !c.is_finite() || *c <= 0.0) {
                return Err(format!("{name} standard deviations must be positive and finite"));
            }
        }
        if !self.max_single_tag_distance.is_finite() || self.max_single_tag_distance < 0.0 {
            return Err("max_single_tag_distance must be a non-negative number".to_string());
        }
        if !self.distance_divisor.is_finite() || self.distance_divisor <= 0.0 {
            return Err("distance_divisor must be positive and finite".to_string());
        }
        Ok(())
    }
}

/// Computes a [`ConfidenceVector`] for a pose derived from a detection result.
#[derive(Debug, Clone)]
pub struct ConfidenceEstimator {
    layout: Arc<TagLayout>,
    config: ConfidenceConfig,
}

impl ConfidenceEstimator {
    pub fn new(layout: Arc<TagLayout>, config: ConfidenceConfig) -> Self {
        Self { layout, config }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    /// Standard deviations for `pose`, estimated from `result`.
    ///
    /// Always returns positive finite values or [`ConfidenceVector::UNUSABLE`].
    pub fn estimate(&self, pose: &Pose2d, result: &DetectionResult) -> ConfidenceVector {
        let mut std_devs = self.config.single_tag;
        let mut num_tags = 0usize;
        let mut total_distance = 0.0;
        for target in &result.targets {
            let Some(tag_pose) = self.layout.tag_pose(target.fiducial_id) else {
                continue;
            };
            num_tags += 1;
            total_distance += tag_pose
                .translation
                .to_translation2d()
                .distance(&pose.translation);
        }
        if num_tags == 0 {
            return std_devs;
        }

        let avg_distance = total_distance / num_tags as f64;
        if num_tags > 1 {
            std_devs = self.config.multi_tag;
        }
        if num_tags == 1 && avg_distance > self.config.max_single_tag_distance {
            debug!(avg_distance, "single far tag; marking estimate unusable");
            return ConfidenceVector::UNUSABLE;
        }

        let scaled = std_devs
            .scaled(1.0 + avg_distance * avg_distance / self.config.distance_divisor);
        if scaled.as_array().iter().all(|c| c.is_finite()) {
            scaled
        } else {
            ConfidenceVector::UNUSABLE
        }
    }
}
