//! `tagpose-hal` – camera sources for the vision stack.
//!
//! # Modules
//!
//! - [`camera`] – the [`CameraSource`][camera::CameraSource] trait and the
//!   [`LiveCamera`][camera::LiveCamera] buffered source fed by an external
//!   detection driver through a [`DetectionFeed`][camera::DetectionFeed].
//! - [`sim`] *(feature `sim`)* – [`SimCamera`][sim::SimCamera], lens/noise
//!   properties and the seeded noise generator.
//! - [`vision_sim`] *(feature `sim`)* – [`VisionSystemSim`][vision_sim::VisionSystemSim]:
//!   regenerates synthetic detections for every simulated camera from a
//!   ground-truth robot pose.
//!
//! Real-robot builds can disable the default `sim` feature, which removes the
//! simulation backdrop (and its `rand` dependencies) entirely.

pub mod camera;
#[cfg(feature = "sim")]
pub mod sim;
#[cfg(feature = "sim")]
pub mod vision_sim;

pub use camera::{CameraSource, DetectionFeed, LiveCamera, detection_channel};
#[cfg(feature = "sim")]
pub use sim::{SimCamera, SimCameraProperties};
#[cfg(feature = "sim")]
pub use vision_sim::VisionSystemSim;
