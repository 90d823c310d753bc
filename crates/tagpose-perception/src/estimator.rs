//! Single-camera pose estimation.
//!
//! [`PoseEstimator`] turns one camera's [`DetectionResult`] into at most one
//! robot [`PoseCandidate`].  It tries its primary [`PoseStrategy`] first
//! (by default the co-processor's multi-tag solution) and falls back to a
//! second strategy (by default the least ambiguous single tag) when the
//! primary one yields nothing.
//!
//! The estimator is a pure function of its inputs and the shared
//! [`TagLayout`]: it holds no per-tick state.

use std::sync::Arc;

use tagpose_types::{
    DetectionResult, FiducialId, Pose3d, PoseCandidate, PoseStrategy, Rotation3d, TagLayout,
    Target, Transform3d, Translation3d,
};
use tracing::debug;

/// Estimates the robot pose from a single camera's detections.
#[derive(Debug, Clone)]
pub struct PoseEstimator {
    layout: Arc<TagLayout>,
    robot_to_camera: Transform3d,
    camera_to_robot: Transform3d,
    primary: PoseStrategy,
    fallback: PoseStrategy,
}

impl PoseEstimator {
    /// Multi-tag on co-processor, falling back to lowest ambiguity.
    pub fn new(layout: Arc<TagLayout>, robot_to_camera: Transform3d) -> Self {
        Self {
            layout,
            robot_to_camera,
            camera_to_robot: robot_to_camera.inverse(),
            primary: PoseStrategy::MultiTagOnCoprocessor,
            fallback: PoseStrategy::LowestAmbiguity,
        }
    }

    pub fn with_primary(mut self, strategy: PoseStrategy) -> Self {
        self.primary = strategy;
        self
    }

    pub fn with_fallback(mut self, strategy: PoseStrategy) -> Self {
        self.fallback = strategy;
        self
    }

    pub fn robot_to_camera(&self) -> &Transform3d {
        &self.robot_to_camera
    }

    pub fn primary(&self) -> PoseStrategy {
        self.primary
    }

    pub fn fallback(&self) -> PoseStrategy {
        self.fallback
    }

    /// Estimate the robot pose from `result`.
    ///
    /// Returns `None` when no target resolves to a tag in the layout.
    pub fn update(&self, result: &DetectionResult) -> Option<PoseCandidate> {
        if !result.has_targets() {
            return None;
        }
        self.estimate_with(self.primary, result).or_else(|| {
            if self.fallback == self.primary {
                return None;
            }
            debug!(primary = ?self.primary, fallback = ?self.fallback, "primary strategy produced no pose");
            self.estimate_with(self.fallback, result)
        })
    }

    fn estimate_with(&self, strategy: PoseStrategy, result: &DetectionResult) -> Option<PoseCandidate> {
        let (pose, targets_used) = match strategy {
            PoseStrategy::MultiTagOnCoprocessor => self.multi_tag(result)?,
            PoseStrategy::LowestAmbiguity => self.lowest_ambiguity(result)?,
            PoseStrategy::ClosestToCameraHeight => self.closest_to_camera_height(result)?,
            PoseStrategy::AverageBestTargets => self.average_best_targets(result)?,
        };
        Some(PoseCandidate {
            pose,
            timestamp_seconds: result.timestamp_seconds,
            targets_used,
            strategy,
        })
    }

    // ── Strategies ──────────────────────────────────────────────────────────

    fn multi_tag(&self, result: &DetectionResult) -> Option<(Pose3d, Vec<FiducialId>)> {
        let multi = result.multi_tag.as_ref()?;
        if multi.fiducial_ids_used.len() < 2 || !multi.field_to_camera.is_finite() {
            return None;
        }
        if !multi
            .fiducial_ids_used
            .iter()
            .any(|id| self.layout.tag_pose(*id).is_some())
        {
            return None;
        }
        let robot = multi
            .field_to_camera
            .as_pose()
            .transform_by(&self.camera_to_robot);
        Some((robot, multi.fiducial_ids_used.clone()))
    }

    fn lowest_ambiguity(&self, result: &DetectionResult) -> Option<(Pose3d, Vec<FiducialId>)> {
        let (target, tag_pose) = self
            .resolved(result)
            .filter(|(t, _)| t.has_ambiguity())
            .min_by(|(a, _), (b, _)| a.ambiguity.total_cmp(&b.ambiguity))?;
        let robot = self.robot_from_tag(&tag_pose, &target.best_camera_to_target);
        Some((robot, vec![target.fiducial_id]))
    }

    fn closest_to_camera_height(&self, result: &DetectionResult) -> Option<(Pose3d, Vec<FiducialId>)> {
        let mount_height = self.robot_to_camera.translation.z;
        let mut best: Option<(f64, Pose3d, FiducialId)> = None;
        for (target, tag_pose) in self.resolved(result) {
            for solution in [&target.best_camera_to_target, &target.alt_camera_to_target] {
                let camera = tag_pose.transform_by(&solution.inverse());
                let error = (camera.translation.z - mount_height).abs();
                if best.as_ref().is_none_or(|(e, _, _)| error < *e) {
                    best = Some((error, camera.transform_by(&self.camera_to_robot), target.fiducial_id));
                }
            }
        }
        best.map(|(_, pose, id)| (pose, vec![id]))
    }

    fn average_best_targets(&self, result: &DetectionResult) -> Option<(Pose3d, Vec<FiducialId>)> {
        let mut weighted: Vec<(f64, Pose3d, FiducialId)> = Vec::new();
        for (target, tag_pose) in self.resolved(result).filter(|(t, _)| t.has_ambiguity()) {
            let robot = self.robot_from_tag(&tag_pose, &target.best_camera_to_target);
            if target.ambiguity == 0.0 {
                // An unambiguous solution outranks any average.
                return Some((robot, vec![target.fiducial_id]));
            }
            weighted.push((1.0 / target.ambiguity, robot, target.fiducial_id));
        }
        if weighted.is_empty() {
            return None;
        }

        let total: f64 = weighted.iter().map(|(w, _, _)| w).sum();
        let reference = weighted[0].1.rotation;
        let mut translation = Translation3d::zero();
        let (mut qw, mut qx, mut qy, mut qz) = (0.0, 0.0, 0.0, 0.0);
        for (w, pose, _) in &weighted {
            let k = w / total;
            translation = translation.add(pose.translation.scale(k));
            let q = pose.rotation;
            // Keep every quaternion in the same hemisphere before summing.
            let sign = if q.w * reference.w + q.x * reference.x + q.y * reference.y + q.z * reference.z < 0.0 {
                -k
            } else {
                k
            };
            qw += sign * q.w;
            qx += sign * q.x;
            qy += sign * q.y;
            qz += sign * q.z;
        }
        let pose = Pose3d::new(translation, Rotation3d::from_quaternion(qw, qx, qy, qz));
        Some((pose, weighted.iter().map(|(_, _, id)| *id).collect()))
    }

    // ── Helpers ─────────────────────────────────────────────────────────────

    /// Targets whose id is known to the layout, paired with the tag pose.
    fn resolved<'a>(
        &'a self,
        result: &'a DetectionResult,
    ) -> impl Iterator<Item = (&'a Target, Pose3d)> + 'a {
        result.targets.iter().filter_map(move |t| {
            let pose = self.layout.tag_pose(t.fiducial_id);
            if pose.is_none() {
                debug!(fiducial_id = t.fiducial_id, "ignoring target absent from tag layout");
            }
            pose.map(|p| (t, p))
        })
    }

    fn robot_from_tag(&self, tag_pose: &Pose3d, camera_to_target: &Transform3d) -> Pose3d {
        tag_pose
            .transform_by(&camera_to_target.inverse())
            .transform_by(&self.camera_to_robot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;
    use tagpose_types::{MultiTagResult, Pose2d};

    fn layout() -> Arc<TagLayout> {
        Arc::new(TagLayout::new(
            16.0,
            8.0,
            [
                (1, Pose3d::new(Translation3d::new(10.0, 0.0, 1.0), Rotation3d::from_yaw(PI))),
                (2, Pose3d::new(Translation3d::new(10.0, 2.0, 1.0), Rotation3d::from_yaw(PI))),
            ],
        ))
    }

    fn mount() -> Transform3d {
        Transform3d::new(Translation3d::new(0.3, 0.0, 0.5), Rotation3d::identity())
    }

    /// Exact camera → tag solution for a robot at `robot` on the floor.
    fn observe(id: FiducialId, robot: &Pose2d, ambiguity: f64) -> Target {
        let cam = Pose3d::from_pose2d(robot).transform_by(&mount());
        let tag = layout().tag_pose(id).unwrap();
        Target::new(id, ambiguity).with_camera_to_target(tag.relative_to(&cam))
    }

    fn assert_near(p: &Pose3d, x: f64, y: f64, heading: f64) {
        let flat = p.to_pose2d();
        assert_abs_diff_eq!(flat.translation.x, x, epsilon = 1e-9);
        assert_abs_diff_eq!(flat.translation.y, y, epsilon = 1e-9);
        assert_abs_diff_eq!(flat.rotation.radians, heading, epsilon = 1e-9);
    }

    #[test]
    fn empty_result_yields_nothing() {
        let est = PoseEstimator::new(layout(), mount());
        assert!(est.update(&DetectionResult::empty(1.0)).is_none());
    }

    #[test]
    fn unknown_targets_yield_nothing() {
        let est = PoseEstimator::new(layout(), mount());
        let result = DetectionResult::with_targets(1.0, vec![Target::new(99, 0.1), Target::new(42, 0.0)]);
        assert!(est.update(&result).is_none());
    }

    #[test]
    fn single_tag_recovers_robot_pose() {
        let truth = Pose2d::from_xy_heading(7.0, 0.5, 0.2);
        let est = PoseEstimator::new(layout(), mount());
        let result = DetectionResult::with_targets(3.25, vec![observe(1, &truth, 0.1)]);

        let candidate = est.update(&result).unwrap();
        assert_near(&candidate.pose, 7.0, 0.5, 0.2);
        assert_eq!(candidate.strategy, PoseStrategy::LowestAmbiguity);
        assert_eq!(candidate.targets_used, vec![1]);
        assert_abs_diff_eq!(candidate.timestamp_seconds, 3.25);
    }

    #[test]
    fn lowest_ambiguity_picks_least_ambiguous_known_target() {
        let truth = Pose2d::from_xy_heading(7.0, 1.0, 0.0);
        let noisy = observe(1, &Pose2d::from_xy_heading(6.0, 1.0, 0.0), 0.4);
        let result = DetectionResult::with_targets(
            1.0,
            vec![noisy, observe(2, &truth, 0.05), Target::new(77, 0.0)],
        );
        let candidate = PoseEstimator::new(layout(), mount()).update(&result).unwrap();
        assert_eq!(candidate.targets_used, vec![2]);
        assert_near(&candidate.pose, 7.0, 1.0, 0.0);
    }

    #[test]
    fn unknown_ambiguity_targets_are_skipped_by_lowest_ambiguity() {
        let truth = Pose2d::from_xy_heading(7.0, 1.0, 0.0);
        let result = DetectionResult::with_targets(
            1.0,
            vec![observe(1, &truth, tagpose_types::AMBIGUITY_UNKNOWN)],
        );
        assert!(PoseEstimator::new(layout(), mount()).update(&result).is_none());
    }

    #[test]
    fn multi_tag_result_is_preferred() {
        let truth = Pose2d::from_xy_heading(6.0, 1.0, 0.1);
        let cam = Pose3d::from_pose2d(&truth).transform_by(&mount());
        let mut result = DetectionResult::with_targets(
            2.0,
            vec![
                observe(1, &Pose2d::from_xy_heading(5.0, 0.0, 0.0), 0.1),
                observe(2, &Pose2d::from_xy_heading(5.0, 0.0, 0.0), 0.1),
            ],
        );
        result.multi_tag = Some(MultiTagResult {
            field_to_camera: Transform3d::new(cam.translation, cam.rotation),
            reprojection_error: 0.2,
            fiducial_ids_used: vec![1, 2],
        });

        let candidate = PoseEstimator::new(layout(), mount()).update(&result).unwrap();
        assert_eq!(candidate.strategy, PoseStrategy::MultiTagOnCoprocessor);
        assert_eq!(candidate.targets_used, vec![1, 2]);
        assert_near(&candidate.pose, 6.0, 1.0, 0.1);
    }

    #[test]
    fn degenerate_multi_tag_falls_back() {
        let truth = Pose2d::from_xy_heading(7.0, 0.0, 0.0);
        let mut result = DetectionResult::with_targets(1.0, vec![observe(1, &truth, 0.1)]);
        result.multi_tag = Some(MultiTagResult {
            field_to_camera: Transform3d::identity(),
            reprojection_error: 0.0,
            fiducial_ids_used: vec![1],
        });
        let candidate = PoseEstimator::new(layout(), mount()).update(&result).unwrap();
        assert_eq!(candidate.strategy, PoseStrategy::LowestAmbiguity);
        assert_near(&candidate.pose, 7.0, 0.0, 0.0);
    }

    #[test]
    fn multi_tag_over_unknown_tags_falls_back_to_nothing() {
        let mut result = DetectionResult::with_targets(1.0, vec![Target::new(50, 0.1)]);
        result.multi_tag = Some(MultiTagResult {
            field_to_camera: Transform3d::identity(),
            reprojection_error: 0.0,
            fiducial_ids_used: vec![50, 51],
        });
        assert!(PoseEstimator::new(layout(), mount()).update(&result).is_none());
    }

    #[test]
    fn same_primary_and_fallback_does_not_retry() {
        let est = PoseEstimator::new(layout(), mount()).with_fallback(PoseStrategy::MultiTagOnCoprocessor);
        let truth = Pose2d::from_xy_heading(7.0, 0.0, 0.0);
        let result = DetectionResult::with_targets(1.0, vec![observe(1, &truth, 0.1)]);
        assert!(est.update(&result).is_none());
    }

    #[test]
    fn closest_to_camera_height_prefers_plausible_solution() {
        let truth = Pose2d::from_xy_heading(7.0, 0.0, 0.0);
        let mut target = observe(1, &truth, 0.3);
        // Alternate solution puts the camera 1 m off the floor plane.
        let mut lifted = target.best_camera_to_target;
        lifted.translation.z -= 1.0;
        target.alt_camera_to_target = target.best_camera_to_target;
        target.best_camera_to_target = lifted;

        let est = PoseEstimator::new(layout(), mount()).with_primary(PoseStrategy::ClosestToCameraHeight);
        let candidate = est.update(&DetectionResult::with_targets(1.0, vec![target])).unwrap();
        assert_eq!(candidate.strategy, PoseStrategy::ClosestToCameraHeight);
        assert_near(&candidate.pose, 7.0, 0.0, 0.0);
        assert_abs_diff_eq!(candidate.pose.translation.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn average_best_targets_weights_by_inverse_ambiguity() {
        let a = observe(1, &Pose2d::from_xy_heading(6.0, 0.0, 0.0), 0.1);
        let b = observe(2, &Pose2d::from_xy_heading(7.0, 0.0, 0.0), 0.3);
        let est = PoseEstimator::new(layout(), mount()).with_primary(PoseStrategy::AverageBestTargets);
        let candidate = est.update(&DetectionResult::with_targets(1.0, vec![a, b])).unwrap();
        // Weights 10 and 3.33 → x = (6*10 + 7*3.333) / 13.333 = 6.25
        assert_abs_diff_eq!(candidate.pose.translation.x, 6.25, epsilon = 1e-9);
        assert_eq!(candidate.targets_used, vec![1, 2]);
    }

    #[test]
    fn average_best_targets_returns_unambiguous_target_directly() {
        let a = observe(1, &Pose2d::from_xy_heading(6.0, 0.0, 0.0), 0.0);
        let b = observe(2, &Pose2d::from_xy_heading(7.0, 0.0, 0.0), 0.3);
        let est = PoseEstimator::new(layout(), mount()).with_primary(PoseStrategy::AverageBestTargets);
        let candidate = est.update(&DetectionResult::with_targets(1.0, vec![a, b])).unwrap();
        assert_near(&candidate.pose, 6.0, 0.0, 0.0);
        assert_eq!(candidate.targets_used, vec![1]);
    }

    #[test]
    fn update_is_pure() {
        let truth = Pose2d::from_xy_heading(7.0, 0.5, 0.2);
        let est = PoseEstimator::new(layout(), mount());
        let result = DetectionResult::with_targets(1.0, vec![observe(1, &truth, 0.1)]);
        assert_eq!(est.update(&result), est.update(&result));
    }
}
