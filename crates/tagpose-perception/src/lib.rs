//! `tagpose-perception` – from fiducial detections to weighted field poses.
//!
//! Each tick, every camera's latest [`DetectionResult`][tagpose_types::DetectionResult]
//! is turned into a robot pose candidate and tagged with per-axis standard
//! deviations so a downstream filter can weigh it against odometry.
//!
//! # Modules
//!
//! - [`estimator`] – [`PoseEstimator`][estimator::PoseEstimator]: single-camera
//!   pose solve with a primary strategy and a fallback.
//! - [`confidence`] – [`ConfidenceEstimator`][confidence::ConfidenceEstimator]:
//!   adaptive standard deviations from tag count and distance.
//! - [`aggregator`] – [`Vision`][aggregator::Vision]: runs every camera and
//!   collects the usable estimates of the tick.
//! - [`builder`] – [`VisionBuilder`][builder::VisionBuilder]: picks live or
//!   simulated cameras at startup.

pub mod aggregator;
pub mod builder;
pub mod confidence;
pub mod estimator;

pub use aggregator::{CameraUnit, FieldSink, Vision};
pub use builder::{ExecutionMode, VisionBuilder, VisionRig};
pub use confidence::{ConfidenceConfig, ConfidenceEstimator};
pub use estimator::PoseEstimator;
