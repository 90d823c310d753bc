//! [`VisionSystemSim`] – synthetic detections from a ground-truth pose.
//!
//! The simulator keeps a registry of simulated cameras.  On every
//! [`update`][VisionSystemSim::update] it places the robot at the supplied
//! ground-truth pose, works out which tags each camera can see, and publishes
//! a noisy [`DetectionResult`] into that camera's buffer.
//!
//! # Visibility model
//!
//! A tag is detected when all of the following hold:
//!
//! | Check | Rule |
//! |---|---|
//! | In front | tag centre has positive depth (+X) in the camera frame |
//! | Field of view | horizontal / vertical angle inside half the FOV |
//! | Range | distance ≤ `max_sight_range` |
//! | Facing | the tag's face normal points toward the camera |
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tagpose_hal::{CameraSource, SimCameraProperties, VisionSystemSim};
//! use tagpose_types::{CameraConfig, Pose2d, TagLayout, Transform3d};
//!
//! let layout = Arc::new(TagLayout::sample_field());
//! let mut sim = VisionSystemSim::new(layout, 42);
//! let mut cam = sim.add_camera(
//!     &CameraConfig::new("front", Transform3d::identity()),
//!     SimCameraProperties::default(),
//! );
//!
//! sim.update(&Pose2d::from_xy_heading(13.0, 5.2, 0.0), 1.0);
//! let result = cam.latest_result().unwrap();
//! assert!(result.has_targets());
//! ```

use std::f64::consts::PI;
use std::sync::Arc;

use tagpose_types::{
    CameraConfig, DetectionResult, FiducialId, MultiTagResult, Pose2d, Pose3d, Rotation3d,
    TagLayout, Target, Transform3d, Translation3d,
};
use tracing::debug;

use crate::camera::{DetectionFeed, detection_channel};
use crate::sim::{NoiseGenerator, SimCamera, SimCameraProperties};

/// Edge length of a printed fiducial tag (metres).
pub const TAG_SIZE_METERS: f64 = 0.1651;

struct SimCameraSlot {
    robot_to_camera: Transform3d,
    properties: SimCameraProperties,
    feed: DetectionFeed,
    last_frame_seconds: Option<f64>,
}

/// Registry of simulated cameras sharing one field and one noise source.
pub struct VisionSystemSim {
    layout: Arc<TagLayout>,
    cameras: Vec<SimCameraSlot>,
    noise: NoiseGenerator,
}

impl VisionSystemSim {
    /// `seed == 0` makes the noise non-deterministic.
    pub fn new(layout: Arc<TagLayout>, seed: u64) -> Self {
        Self {
            layout,
            cameras: Vec::new(),
            noise: NoiseGenerator::new(seed),
        }
    }

    /// Register a simulated camera and return its [`SimCamera`] source.
    pub fn add_camera(
        &mut self,
        config: &CameraConfig,
        properties: SimCameraProperties,
    ) -> SimCamera {
        let (feed, live) = detection_channel(config.name.clone());
        self.cameras.push(SimCameraSlot {
            robot_to_camera: config.robot_to_camera,
            properties: properties.clone(),
            feed,
            last_frame_seconds: None,
        });
        SimCamera::new(live, properties)
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    /// Regenerate detections for every camera whose next frame is due.
    ///
    /// `now_seconds` is the simulation clock; result timestamps are
    /// `now_seconds` minus a sampled pipeline latency.
    pub fn update(&mut self, ground_truth: &Pose2d, now_seconds: f64) {
        let robot = Pose3d::from_pose2d(ground_truth);
        for slot in &mut self.cameras {
            if let Some(last) = slot.last_frame_seconds
                && now_seconds - last < slot.properties.frame_period()
            {
                continue;
            }
            slot.last_frame_seconds = Some(now_seconds);

            let camera_pose = robot.transform_by(&slot.robot_to_camera);
            let result = synthesize(
                &self.layout,
                &camera_pose,
                &slot.properties,
                &mut self.noise,
                now_seconds,
            );
            debug!(
                camera = slot.feed.name(),
                visible = result.targets.len(),
                multi_tag = result.multi_tag.is_some(),
                "sim frame"
            );
            slot.feed.publish(result);
        }
    }
}

/// Build one synthetic detection result for a camera at `camera_pose`.
pub(crate) fn synthesize(
    layout: &TagLayout,
    camera_pose: &Pose3d,
    props: &SimCameraProperties,
    noise: &mut NoiseGenerator,
    now_seconds: f64,
) -> DetectionResult {
    let half_h = props.horizontal_fov() / 2.0;
    let half_v = props.vertical_fov() / 2.0;
    let rad_per_px = props.radians_per_pixel();

    let mut targets = Vec::new();
    let mut angular_errors = Vec::new();

    for (id, tag_pose) in layout.tags() {
        let cam_to_tag = tag_pose.relative_to(camera_pose);
        let t = cam_to_tag.translation;
        let range = t.norm();
        if t.x <= 0.0 || range > props.max_sight_range {
            continue;
        }
        let yaw = t.y.atan2(t.x);
        let pitch = t.z.atan2(t.x.hypot(t.y));
        if yaw.abs() > half_h || pitch.abs() > half_v {
            continue;
        }

        let normal = tag_pose.rotation.rotate(Translation3d::new(1.0, 0.0, 0.0));
        let to_camera = camera_pose.translation.sub(tag_pose.translation);
        let cos_incidence = normal.dot(to_camera) / range;
        if cos_incidence <= 0.0 {
            continue;
        }

        let pixel_error = noise
            .biased_gaussian(props.avg_error_px, props.error_stddev_px)
            .abs();
        let angular_error = pixel_error * rad_per_px;
        angular_errors.push(angular_error);

        let noisy_yaw = yaw + noise.gaussian(angular_error);
        let noisy_pitch = pitch + noise.gaussian(angular_error);
        let noisy_range = (range + noise.gaussian(range * angular_error)).max(0.0);
        let translation = Translation3d::new(
            noisy_range * noisy_pitch.cos() * noisy_yaw.cos(),
            noisy_range * noisy_pitch.cos() * noisy_yaw.sin(),
            noisy_range * noisy_pitch.sin(),
        );
        let r = cam_to_tag.rotation;
        let tag_yaw = r.yaw() + noise.gaussian(2.0 * angular_error);
        let best = Transform3d::new(
            translation,
            Rotation3d::from_euler(r.roll(), r.pitch(), tag_yaw),
        );
        // Planar-target flip: mirror the tag's yaw about the line of sight.
        let line_of_sight = yaw + PI;
        let alt = Transform3d::new(
            translation,
            Rotation3d::from_euler(r.roll(), r.pitch(), 2.0 * line_of_sight - tag_yaw),
        );

        let apparent_px = TAG_SIZE_METERS * cos_incidence / range / rad_per_px;
        let area = (apparent_px * apparent_px
            / (f64::from(props.width) * f64::from(props.height)))
        .clamp(0.0, 1.0);

        targets.push(Target {
            fiducial_id: id,
            ambiguity: ambiguity(range, cos_incidence, props.max_sight_range),
            best_camera_to_target: best,
            alt_camera_to_target: alt,
            yaw: noisy_yaw,
            pitch: noisy_pitch,
            area,
        });
    }

    let multi_tag = (targets.len() >= 2).then(|| {
        let mean_error = angular_errors.iter().sum::<f64>() / angular_errors.len() as f64;
        let mean_range = targets
            .iter()
            .map(|t| t.best_camera_to_target.translation.norm())
            .sum::<f64>()
            / targets.len() as f64;
        // Several tags constrain the solve, so spread is tighter than any
        // single-tag solution.
        let spread = mean_range * mean_error / (targets.len() as f64).sqrt();
        let translation = camera_pose.translation.add(Translation3d::new(
            noise.gaussian(spread),
            noise.gaussian(spread),
            noise.gaussian(spread),
        ));
        let rotation = camera_pose
            .rotation
            .mul(Rotation3d::from_yaw(noise.gaussian(mean_error)));
        MultiTagResult {
            field_to_camera: Transform3d::new(translation, rotation),
            reprojection_error: mean_error / props.radians_per_pixel(),
            fiducial_ids_used: targets.iter().map(|t| t.fiducial_id).collect::<Vec<FiducialId>>(),
        }
    });

    let latency_millis = noise
        .biased_gaussian(props.avg_latency_ms, props.latency_stddev_ms)
        .max(0.0);

    DetectionResult {
        // Capture time cannot precede the start of the simulation clock.
        timestamp_seconds: (now_seconds - latency_millis / 1000.0).max(0.0),
        latency_millis,
        targets,
        multi_tag,
    }
}

/// Synthetic pose ambiguity: grows with range and with obliqueness.
fn ambiguity(range: f64, cos_incidence: f64, max_range: f64) -> f64 {
    let far = if max_range > 0.0 { range / max_range } else { 1.0 };
    (0.5 * far * far + 0.3 * (1.0 - cos_incidence)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraSource;
    use approx::assert_abs_diff_eq;

    fn quiet_props() -> SimCameraProperties {
        SimCameraProperties {
            avg_error_px: 0.0,
            error_stddev_px: 0.0,
            avg_latency_ms: 0.0,
            latency_stddev_ms: 0.0,
            ..SimCameraProperties::default()
        }
    }

    /// One tag on the +X wall at (10, 0, 0), facing back toward the origin.
    fn wall_layout() -> Arc<TagLayout> {
        Arc::new(TagLayout::new(
            12.0,
            6.0,
            [(
                1,
                Pose3d::new(Translation3d::new(10.0, 0.0, 0.0), Rotation3d::from_yaw(PI)),
            )],
        ))
    }

    fn front_camera() -> CameraConfig {
        CameraConfig::new("front", Transform3d::identity())
    }

    #[test]
    fn tag_in_view_is_detected_exactly_without_noise() {
        let mut sim = VisionSystemSim::new(wall_layout(), 1);
        let mut cam = sim.add_camera(&front_camera(), quiet_props());
        sim.update(&Pose2d::from_xy_heading(7.0, 0.0, 0.0), 2.0);

        let result = cam.latest_result().unwrap();
        assert_eq!(result.targets.len(), 1);
        let t = &result.targets[0];
        assert_eq!(t.fiducial_id, 1);
        assert_abs_diff_eq!(t.best_camera_to_target.translation.x, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(t.best_camera_to_target.translation.y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.timestamp_seconds, 2.0);
        assert!(result.multi_tag.is_none());
    }

    #[test]
    fn tag_beyond_sight_range_is_not_detected() {
        let mut sim = VisionSystemSim::new(wall_layout(), 1);
        let mut cam = sim.add_camera(&front_camera(), quiet_props());
        sim.update(&Pose2d::from_xy_heading(2.0, 0.0, 0.0), 1.0);
        assert!(!cam.latest_result().unwrap().has_targets());
    }

    #[test]
    fn tag_behind_camera_is_not_detected() {
        let mut sim = VisionSystemSim::new(wall_layout(), 1);
        let mut cam = sim.add_camera(&front_camera(), quiet_props());
        sim.update(&Pose2d::from_xy_heading(7.0, 0.0, PI), 1.0);
        assert!(!cam.latest_result().unwrap().has_targets());
    }

    #[test]
    fn tag_seen_from_behind_is_not_detected() {
        let mut sim = VisionSystemSim::new(wall_layout(), 1);
        let mut cam = sim.add_camera(&front_camera(), quiet_props());
        // Robot past the wall looking back at the tag's blank side.
        sim.update(&Pose2d::from_xy_heading(12.0, 0.0, PI), 1.0);
        assert!(!cam.latest_result().unwrap().has_targets());
    }

    #[test]
    fn tag_outside_horizontal_fov_is_not_detected() {
        let mut sim = VisionSystemSim::new(wall_layout(), 1);
        let mut cam = sim.add_camera(&front_camera(), quiet_props());
        // Tag is straight ahead but the robot is turned 80° left.
        sim.update(&Pose2d::from_xy_heading(7.0, 0.0, 80f64.to_radians()), 1.0);
        assert!(!cam.latest_result().unwrap().has_targets());
    }

    #[test]
    fn frames_are_paced_by_fps() {
        let mut sim = VisionSystemSim::new(wall_layout(), 1);
        let mut cam = sim.add_camera(&front_camera(), quiet_props());
        sim.update(&Pose2d::from_xy_heading(7.0, 0.0, 0.0), 1.0);
        // 5 ms later is faster than 45 fps allows; the old frame stays.
        sim.update(&Pose2d::from_xy_heading(7.5, 0.0, 0.0), 1.005);
        let result = cam.latest_result().unwrap();
        assert_abs_diff_eq!(result.timestamp_seconds, 1.0);
        assert_abs_diff_eq!(
            result.targets[0].best_camera_to_target.translation.x,
            3.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn latency_is_subtracted_from_capture_time() {
        let mut sim = VisionSystemSim::new(wall_layout(), 1);
        let props = SimCameraProperties {
            avg_latency_ms: 50.0,
            ..quiet_props()
        };
        let mut cam = sim.add_camera(&front_camera(), props);
        sim.update(&Pose2d::from_xy_heading(7.0, 0.0, 0.0), 2.0);
        let result = cam.latest_result().unwrap();
        assert_abs_diff_eq!(result.timestamp_seconds, 1.95, epsilon = 1e-12);
        assert_abs_diff_eq!(result.latency_millis, 50.0, epsilon = 1e-12);
    }

    #[test]
    fn first_frame_timestamp_is_never_negative() {
        let mut sim = VisionSystemSim::new(wall_layout(), 1);
        let props = SimCameraProperties {
            avg_latency_ms: 50.0,
            ..quiet_props()
        };
        let mut cam = sim.add_camera(&front_camera(), props);
        sim.update(&Pose2d::from_xy_heading(7.0, 0.0, 0.0), 0.01);
        let result = cam.latest_result().unwrap();
        assert!(result.has_targets());
        assert_eq!(result.timestamp_seconds, 0.0);
    }

    #[test]
    fn two_visible_tags_produce_multi_tag_result() {
        let layout = Arc::new(TagLayout::new(
            12.0,
            6.0,
            [
                (1, Pose3d::new(Translation3d::new(10.0, 0.5, 0.0), Rotation3d::from_yaw(PI))),
                (2, Pose3d::new(Translation3d::new(10.0, -0.5, 0.0), Rotation3d::from_yaw(PI))),
            ],
        ));
        let mut sim = VisionSystemSim::new(layout, 1);
        let mut cam = sim.add_camera(&front_camera(), quiet_props());
        sim.update(&Pose2d::from_xy_heading(7.0, 0.0, 0.0), 1.0);

        let result = cam.latest_result().unwrap();
        let multi = result.multi_tag.expect("two tags in view");
        assert_eq!(multi.fiducial_ids_used, vec![1, 2]);
        assert_abs_diff_eq!(multi.field_to_camera.translation.x, 7.0, epsilon = 1e-9);
    }

    #[test]
    fn ambiguity_grows_with_range() {
        let near = ambiguity(1.0, 1.0, 7.0);
        let far = ambiguity(6.0, 1.0, 7.0);
        assert!(far > near);
        assert!((0.0..=1.0).contains(&far));
    }

    #[test]
    fn sample_field_is_visible_from_midfield_facing_speaker() {
        let mut sim = VisionSystemSim::new(Arc::new(TagLayout::sample_field()), 9);
        let mut cam = sim.add_camera(&front_camera(), SimCameraProperties::default());
        sim.update(&Pose2d::from_xy_heading(13.0, 5.2, 0.0), 1.0);
        let result = cam.latest_result().unwrap();
        assert!(result.targets.iter().any(|t| t.fiducial_id == 3 || t.fiducial_id == 4));
        assert_eq!(sim.camera_count(), 1);
    }
}
