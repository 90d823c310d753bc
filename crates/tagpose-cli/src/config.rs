//! Configuration file – reads/writes `~/.tagpose/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use tagpose_perception::{ConfidenceConfig, ExecutionMode};
use tagpose_types::{CameraConfig, Rotation3d, Transform3d, Translation3d};

/// One camera mount: where it sits on the robot and which way it looks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraEntry {
    pub name: String,
    /// Mount position in robot coordinates (metres, x forward, y left, z up).
    #[serde(default)]
    pub translation: [f64; 3],
    #[serde(default)]
    pub roll_deg: f64,
    #[serde(default)]
    pub pitch_deg: f64,
    #[serde(default)]
    pub yaw_deg: f64,
}

impl CameraEntry {
    pub fn to_camera_config(&self) -> CameraConfig {
        let [x, y, z] = self.translation;
        CameraConfig::new(
            self.name.clone(),
            Transform3d::new(
                Translation3d::new(x, y, z),
                Rotation3d::from_euler(
                    self.roll_deg.to_radians(),
                    self.pitch_deg.to_radians(),
                    self.yaw_deg.to_radians(),
                ),
            ),
        )
    }
}

/// Simulated camera model, shared by every camera in simulation mode.
///
/// The camera fields sit directly under `[sim]` next to `seed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSection {
    /// Noise seed; `0` draws from entropy.
    pub seed: u64,
    #[cfg(feature = "sim")]
    #[serde(flatten)]
    pub camera: tagpose_hal::SimCameraProperties,
}

/// Persisted configuration stored in `~/.tagpose/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Live detections or the simulator.
    #[serde(default = "default_mode")]
    pub mode: ExecutionMode,

    /// Field layout JSON.  The embedded sample field is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_layout: Option<PathBuf>,

    /// Period of the estimation loop.
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: u64,

    /// Number of ticks to run; `0` runs until interrupted.
    #[serde(default)]
    pub ticks: u64,

    #[serde(default = "default_cameras")]
    pub cameras: Vec<CameraEntry>,

    #[serde(default)]
    pub confidence: ConfidenceConfig,

    #[serde(default)]
    pub sim: SimSection,
}

fn default_mode() -> ExecutionMode {
    ExecutionMode::Simulation
}
fn default_tick_period_ms() -> u64 {
    20
}
fn default_cameras() -> Vec<CameraEntry> {
    vec![CameraEntry {
        name: "cam".to_string(),
        translation: [0.5, 0.5, -0.5],
        roll_deg: 0.0,
        pitch_deg: 0.0,
        yaw_deg: 0.0,
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            tag_layout: None,
            tick_period_ms: default_tick_period_ms(),
            ticks: 0,
            cameras: default_cameras(),
            confidence: ConfidenceConfig::default(),
            sim: SimSection::default(),
        }
    }
}

impl Config {
    pub fn camera_configs(&self) -> Vec<CameraConfig> {
        self.cameras.iter().map(CameraEntry::to_camera_config).collect()
    }
}

/// Return the path to `~/.tagpose/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".tagpose").join("config.toml")
}

/// Load the config from `path`, falling back to defaults when the file does
/// not exist.  Environment overrides are applied either way.
pub fn resolve(path: &Path) -> Result<Config, String> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config at {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

/// Apply `TAGPOSE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TAGPOSE_MODE` | `mode` (`live` / `simulation`) |
/// | `TAGPOSE_TAG_LAYOUT` | `tag_layout` |
/// | `TAGPOSE_SIM_SEED` | `sim.seed` |
///
/// Unparseable values are ignored with a warning.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TAGPOSE_MODE") {
        match v.parse::<ExecutionMode>() {
            Ok(mode) => cfg.mode = mode,
            Err(e) => warn!(value = %v, error = %e, "ignoring TAGPOSE_MODE"),
        }
    }
    if let Ok(v) = std::env::var("TAGPOSE_TAG_LAYOUT")
        && !v.trim().is_empty()
    {
        cfg.tag_layout = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("TAGPOSE_SIM_SEED") {
        match v.parse::<u64>() {
            Ok(seed) => cfg.sim.seed = seed,
            Err(e) => warn!(value = %v, error = %e, "ignoring TAGPOSE_SIM_SEED"),
        }
    }
}

/// Save the config to a specific path, creating its directory if necessary.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
