//! Startup wiring: choose live or simulated cameras once, then hand back a
//! ready [`Vision`] plus whatever the caller needs to drive it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tagpose_hal::{CameraSource, DetectionFeed, detection_channel};
#[cfg(feature = "sim")]
use tagpose_hal::{SimCameraProperties, VisionSystemSim};
use tagpose_types::{CameraConfig, PoseStrategy, TagLayout, VisionError};
use tracing::info;

use crate::aggregator::{CameraUnit, Vision};
use crate::confidence::{ConfidenceConfig, ConfidenceEstimator};
use crate::estimator::PoseEstimator;

/// Where detections come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Detections are published by an external driver through [`DetectionFeed`]s.
    #[default]
    Live,
    /// Detections are synthesised by a [`VisionSystemSim`].
    Simulation,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Live => write!(f, "live"),
            ExecutionMode::Simulation => write!(f, "simulation"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" | "real" => Ok(ExecutionMode::Live),
            "simulation" | "sim" => Ok(ExecutionMode::Simulation),
            other => Err(VisionError::Config(format!("unknown execution mode '{other}'"))),
        }
    }
}

/// Everything produced by [`VisionBuilder::build`].
pub struct VisionRig {
    pub vision: Vision,
    /// Publisher side of each live camera, in configuration order.  Empty in
    /// simulation mode.
    pub live_feeds: Vec<DetectionFeed>,
    /// The simulator driving every camera.  `None` in live mode.
    #[cfg(feature = "sim")]
    pub sim: Option<VisionSystemSim>,
}

/// Collects cameras and tuning, then builds a [`VisionRig`] for one mode.
pub struct VisionBuilder {
    layout: Arc<TagLayout>,
    cameras: Vec<CameraConfig>,
    confidence: ConfidenceConfig,
    primary: PoseStrategy,
    fallback: PoseStrategy,
    #[cfg(feature = "sim")]
    sim_properties: SimCameraProperties,
    #[cfg_attr(not(feature = "sim"), allow(dead_code))]
    sim_seed: u64,
}

impl VisionBuilder {
    pub fn new(layout: Arc<TagLayout>) -> Self {
        Self {
            layout,
            cameras: Vec::new(),
            confidence: ConfidenceConfig::default(),
            primary: PoseStrategy::MultiTagOnCoprocessor,
            fallback: PoseStrategy::LowestAmbiguity,
            #[cfg(feature = "sim")]
            sim_properties: SimCameraProperties::default(),
            sim_seed: 0,
        }
    }

    pub fn camera(mut self, config: CameraConfig) -> Self {
        self.cameras.push(config);
        self
    }

    pub fn cameras(mut self, configs: impl IntoIterator<Item = CameraConfig>) -> Self {
        self.cameras.extend(configs);
        self
    }

    pub fn confidence(mut self, config: ConfidenceConfig) -> Self {
        self.confidence = config;
        self
    }

    pub fn strategies(mut self, primary: PoseStrategy, fallback: PoseStrategy) -> Self {
        self.primary = primary;
        self.fallback = fallback;
        self
    }

    /// Lens and noise model shared by every simulated camera.
    #[cfg(feature = "sim")]
    pub fn sim_properties(mut self, properties: SimCameraProperties) -> Self {
        self.sim_properties = properties;
        self
    }

    /// Noise seed for simulation; `0` draws from entropy.
    pub fn sim_seed(mut self, seed: u64) -> Self {
        self.sim_seed = seed;
        self
    }

    /// Wire every configured camera for `mode`.
    ///
    /// # Errors
    ///
    /// - [`VisionError::Config`] if the confidence constants are invalid or
    ///   two cameras share a name.
    /// - [`VisionError::SimulationUnavailable`] if `mode` is
    ///   [`ExecutionMode::Simulation`] and the `sim` feature is disabled.
    pub fn build(mut self, mode: ExecutionMode) -> Result<VisionRig, VisionError> {
        self.confidence.validate().map_err(VisionError::Config)?;
        for (i, camera) in self.cameras.iter().enumerate() {
            if self.cameras[..i].iter().any(|c| c.name == camera.name) {
                return Err(VisionError::Config(format!(
                    "duplicate camera name '{}'",
                    camera.name
                )));
            }
        }

        let confidence = ConfidenceEstimator::new(self.layout.clone(), self.confidence);
        let mut vision = Vision::new(confidence);

        info!(
            %mode,
            cameras = self.cameras.len(),
            tags = self.layout.len(),
            "building vision pipeline"
        );

        let cameras = std::mem::take(&mut self.cameras);
        match mode {
            ExecutionMode::Live => {
                let mut live_feeds = Vec::with_capacity(cameras.len());
                for config in cameras {
                    let (feed, camera) = detection_channel(config.name.clone());
                    live_feeds.push(feed);
                    let unit = self.unit(config, Box::new(camera));
                    vision.add_camera(unit);
                }
                Ok(VisionRig {
                    vision,
                    live_feeds,
                    #[cfg(feature = "sim")]
                    sim: None,
                })
            }
            #[cfg(feature = "sim")]
            ExecutionMode::Simulation => {
                let mut sim = VisionSystemSim::new(self.layout.clone(), self.sim_seed);
                for config in cameras {
                    let camera = sim.add_camera(&config, self.sim_properties.clone());
                    let unit = self.unit(config, Box::new(camera));
                    vision.add_camera(unit);
                }
                Ok(VisionRig {
                    vision,
                    live_feeds: Vec::new(),
                    sim: Some(sim),
                })
            }
            #[cfg(not(feature = "sim"))]
            ExecutionMode::Simulation => Err(VisionError::SimulationUnavailable),
        }
    }

    fn unit(&self, config: CameraConfig, source: Box<dyn CameraSource>) -> CameraUnit {
        let estimator = PoseEstimator::new(self.layout.clone(), config.robot_to_camera)
            .with_primary(self.primary)
            .with_fallback(self.fallback);
        CameraUnit::new(config, source, estimator)
    }
}
