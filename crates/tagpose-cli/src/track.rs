//! Ground-truth robot motion for simulation runs.
//!
//! The robot sweeps back and forth in front of the tags nearest the field
//! origin wall while facing them, so a run covers near multi-tag views, far
//! single-tag views and frames with nothing in sight.

use std::f64::consts::{PI, TAU};

use tagpose_types::{Pose2d, TagLayout};

/// Smooth periodic path in field coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepTrack {
    /// Centre of the sweep (metres).
    pub center: (f64, f64),
    /// Half-extent along x and y (metres).
    pub amplitude: (f64, f64),
    /// Heading at the centre of the sweep (radians).
    pub base_heading: f64,
    /// Peak heading deviation (radians).
    pub heading_sway: f64,
    /// Time for one full x sweep (seconds).
    pub period_s: f64,
}

impl SweepTrack {
    /// Track facing the tags on the low-x wall of `layout`, i.e. the tags
    /// near `x = 0` whose faces point down the field.
    ///
    /// Falls back to the middle of the field when the layout has no tags.
    pub fn facing_origin_wall(layout: &TagLayout) -> Self {
        let wall_tags: Vec<_> = layout
            .tags()
            .filter(|(_, pose)| {
                pose.translation.x < layout.field_length() / 4.0 && pose.rotation.yaw().cos() > 0.5
            })
            .map(|(_, pose)| pose.translation.y)
            .collect();
        let center_y = if wall_tags.is_empty() {
            layout.field_width() / 2.0
        } else {
            wall_tags.iter().sum::<f64>() / wall_tags.len() as f64
        };
        Self {
            center: (4.0, center_y),
            amplitude: (2.0, 0.5),
            base_heading: PI,
            heading_sway: 20f64.to_radians(),
            period_s: 10.0,
        }
    }

    /// Robot pose at simulation time `t` (seconds).
    pub fn pose_at(&self, t: f64) -> Pose2d {
        let phase = TAU * t / self.period_s;
        Pose2d::from_xy_heading(
            self.center.0 + self.amplitude.0 * phase.sin(),
            self.center.1 + self.amplitude.1 * (phase / 0.7).sin(),
            self.base_heading + self.heading_sway * (phase / 1.3).sin(),
        )
    }
}
