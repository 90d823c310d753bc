//! Terminal output for the estimation loop.

use colored::Colorize;
use tagpose_perception::FieldSink;
use tagpose_types::{Pose2d, PoseEstimate};

/// How each tick is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable, coloured lines.
    Pretty,
    /// One JSON object per estimate.
    Json,
}

/// Field view on the terminal: the displayed robot pose is the first
/// estimate of each tick.
pub struct ConsoleField {
    format: OutputFormat,
    last: Option<Pose2d>,
}

impl ConsoleField {
    pub fn new(format: OutputFormat) -> Self {
        Self { format, last: None }
    }

    pub fn last_pose(&self) -> Option<Pose2d> {
        self.last
    }
}

impl FieldSink for ConsoleField {
    fn set_robot_pose(&mut self, pose: Pose2d) {
        self.last = Some(pose);
        if self.format == OutputFormat::Pretty {
            println!(
                "  {} x={:>6.2} y={:>6.2} θ={:>7.1}°",
                "field".bold().cyan(),
                pose.translation.x,
                pose.translation.y,
                pose.rotation.degrees()
            );
        }
    }
}

/// Render one estimate as a single line.
pub fn format_estimate(tick: u64, estimate: &PoseEstimate, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::json!({
            "tick": tick,
            "estimate": estimate,
            "usable": estimate.std_devs.is_usable(),
        })
        .to_string(),
        OutputFormat::Pretty => {
            let pose = estimate.candidate.pose.to_pose2d();
            let confidence = if estimate.std_devs.is_usable() {
                format!(
                    "σ=({:.2}, {:.2}, {:.2})",
                    estimate.std_devs.x, estimate.std_devs.y, estimate.std_devs.heading
                )
                .normal()
            } else {
                "unusable".yellow()
            };
            format!(
                "[{tick:>5}] {:<8} x={:>6.2} y={:>6.2} θ={:>7.1}° tags={:?} {:?} {}",
                estimate.camera.bold(),
                pose.translation.x,
                pose.translation.y,
                pose.rotation.degrees(),
                estimate.candidate.targets_used,
                estimate.candidate.strategy,
                confidence
            )
        }
    }
}
