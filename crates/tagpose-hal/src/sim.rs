//! Simulated camera building blocks.
//!
//! [`SimCamera`] is a [`CameraSource`] fed by a
//! [`VisionSystemSim`][crate::vision_sim::VisionSystemSim] instead of a real
//! detection driver.  From the aggregator's point of view it is
//! indistinguishable from a [`LiveCamera`].
//!
//! [`SimCameraProperties`] describes lens, noise and timing characteristics;
//! the defaults model an 800×600 global-shutter sensor behind a 100° lens.

use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tagpose_types::{DetectionResult, VisionError};

use crate::camera::{CameraSource, LiveCamera};

// ────────────────────────────────────────────────────────────────────────────
// Camera properties
// ────────────────────────────────────────────────────────────────────────────

/// Lens, noise and timing characteristics of a simulated camera.
///
/// Missing fields deserialize to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimCameraProperties {
    /// Image width (pixels).
    pub width: u32,
    /// Image height (pixels).
    pub height: u32,
    /// Diagonal field of view (degrees).
    pub fov_diagonal_deg: f64,
    /// Mean corner detection error (pixels).
    pub avg_error_px: f64,
    /// Standard deviation of the corner detection error (pixels).
    pub error_stddev_px: f64,
    /// Frame rate; no new result is produced faster than this.
    pub fps: f64,
    pub avg_latency_ms: f64,
    pub latency_stddev_ms: f64,
    /// Tags farther than this (metres) are never detected.
    pub max_sight_range: f64,
}

impl Default for SimCameraProperties {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            fov_diagonal_deg: 100.0,
            avg_error_px: 0.35,
            error_stddev_px: 0.10,
            fps: 45.0,
            avg_latency_ms: 12.0,
            latency_stddev_ms: 3.5,
            max_sight_range: 7.0,
        }
    }
}

impl SimCameraProperties {
    fn focal_length_px(&self) -> f64 {
        let diag_px = f64::from(self.width).hypot(f64::from(self.height));
        (diag_px / 2.0) / (self.fov_diagonal_deg.to_radians() / 2.0).tan()
    }

    /// Horizontal field of view (radians).
    pub fn horizontal_fov(&self) -> f64 {
        2.0 * (f64::from(self.width) / 2.0 / self.focal_length_px()).atan()
    }

    /// Vertical field of view (radians).
    pub fn vertical_fov(&self) -> f64 {
        2.0 * (f64::from(self.height) / 2.0 / self.focal_length_px()).atan()
    }

    /// Approximate angle subtended by one pixel (radians).
    pub fn radians_per_pixel(&self) -> f64 {
        1.0 / self.focal_length_px()
    }

    /// Minimum time between two frames (seconds).
    pub fn frame_period(&self) -> f64 {
        if self.fps > 0.0 { 1.0 / self.fps } else { 0.0 }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Noise
// ────────────────────────────────────────────────────────────────────────────

/// Gaussian noise source with optional deterministic seeding.
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    /// `seed == 0` draws from OS entropy; any other seed is reproducible.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    /// Zero-mean Gaussian sample with the given standard deviation.
    pub fn gaussian(&mut self, stddev: f64) -> f64 {
        if stddev <= 0.0 {
            return 0.0;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        n * stddev
    }

    pub fn biased_gaussian(&mut self, mean: f64, stddev: f64) -> f64 {
        mean + self.gaussian(stddev)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimCamera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera.  Results are published by the owning
/// [`VisionSystemSim`][crate::vision_sim::VisionSystemSim] on each update.
#[derive(Debug)]
pub struct SimCamera {
    inner: LiveCamera,
    properties: SimCameraProperties,
}

impl SimCamera {
    pub(crate) fn new(inner: LiveCamera, properties: SimCameraProperties) -> Self {
        Self { inner, properties }
    }

    pub fn properties(&self) -> &SimCameraProperties {
        &self.properties
    }
}

impl CameraSource for SimCamera {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn latest_result(&mut self) -> Result<DetectionResult, VisionError> {
        self.inner.latest_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn default_fov_split_matches_aspect_ratio() {
        let p = SimCameraProperties::default();
        let h = p.horizontal_fov().to_degrees();
        let v = p.vertical_fov().to_degrees();
        assert!(h > v);
        assert!(h < 100.0 && v < 100.0);
        // 4:3 sensor: tan(h/2) / tan(v/2) == 4/3.
        assert_abs_diff_eq!(
            (p.horizontal_fov() / 2.0).tan() / (p.vertical_fov() / 2.0).tan(),
            4.0 / 3.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn frame_period_from_fps() {
        let p = SimCameraProperties::default();
        assert_abs_diff_eq!(p.frame_period(), 1.0 / 45.0);
        let stopped = SimCameraProperties {
            fps: 0.0,
            ..SimCameraProperties::default()
        };
        assert_eq!(stopped.frame_period(), 0.0);
    }

    #[test]
    fn seeded_noise_is_deterministic() {
        let mut a = NoiseGenerator::new(7);
        let mut b = NoiseGenerator::new(7);
        for _ in 0..50 {
            assert_eq!(a.gaussian(1.0), b.gaussian(1.0));
        }
    }

    #[test]
    fn zero_stddev_is_silent() {
        let mut n = NoiseGenerator::new(7);
        assert_eq!(n.gaussian(0.0), 0.0);
        assert_eq!(n.biased_gaussian(3.0, 0.0), 3.0);
    }
}
