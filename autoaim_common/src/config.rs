//! Typed YAML configuration loading.
//!
//! A single YAML document configures the whole pipeline. Each section
//! maps to a struct below; every section has defaults so a minimal file
//! only needs `shared.service_name`. The `gimbal` section is the
//! calibration artifact produced by the `autoaim_calibrate` tool.
//!
//! # Usage
//!
//! ```rust,no_run
//! use autoaim_common::config::{ConfigLoader, PipelineConfig};
//! use std::path::Path;
//!
//! let config = PipelineConfig::load(Path::new("autoaim.yaml")).unwrap();
//! config.validate().unwrap();
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts;

/// Why a configuration document was rejected.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read; carries the path and the I/O cause
    /// (missing file, permissions, and so on).
    #[error("cannot read config {path:?}: {source}")]
    Unreadable {
        /// Path the loader was given.
        path: PathBuf,
        /// Underlying read failure.
        source: std::io::Error,
    },

    /// The text is not YAML matching the expected schema.
    #[error("config does not parse: {0}")]
    Syntax(String),

    /// A field survived parsing but its value is out of range or
    /// inconsistent with another field.
    #[error("config rejected: {0}")]
    Invalid(String),
}

/// Log verbosity, written lowercase in the YAML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Everything, including per-cycle chatter.
    Trace,
    /// Developer diagnostics.
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Unexpected but recoverable situations.
    Warn,
    /// Failures that need attention.
    Error,
}

/// Instance identity and log verbosity, common to both binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Log verbosity for the tracing subscriber.
    #[serde(default)]
    pub log_level: LogLevel,
    /// Name identifying this robot/installation in the logs.
    pub service_name: String,
}

/// Detection stage configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Confidence floor applied after keypoint refinement.
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,
    /// Selector grace window before a lost target is released [s].
    #[serde(default = "default_max_ttl")]
    pub max_ttl: f32,
    /// Ring radius seeded on first acquisition [m].
    #[serde(default = "default_radius")]
    pub default_radius: f32,
}

/// Particle filter configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PfConfig {
    /// Particle count handed to the kernel at startup.
    #[serde(default = "default_particle_count")]
    pub particle_count: usize,
}

/// Prediction stage configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Bullet speed assumed before the first MCU measurement [m/s].
    #[serde(default = "default_bullet_speed")]
    pub initial_bullet_speed: f32,
    /// Gimbal actuation delay added to the lead horizon [s].
    #[serde(default = "default_t_gimbal")]
    pub t_gimbal_actuation: f32,
    /// Empirical scaling of the fire-window tolerances.
    #[serde(default = "default_tolerance_coeff")]
    pub tolerance_coeff: f32,
}

/// Serial link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Device path of the MCU link.
    #[serde(default = "default_serial_device")]
    pub device: String,
    /// Baud rate (8N1, no flow control).
    #[serde(default = "default_baud")]
    pub baud: u32,
}

/// Gimbal physical limits, loaded from the calibration artifact.
///
/// Produced by `autoaim_calibrate`; consumed by the prediction stage's
/// command clamp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GimbalConfig {
    /// Lowest commandable pitch [rad] (looking down).
    pub pitch_min: f32,
    /// Highest commandable pitch [rad] (looking up).
    pub pitch_max: f32,
    /// Yaw lower limit [rad]; ignored when `has_yaw_limits` is false.
    #[serde(default = "default_yaw_min")]
    pub yaw_min: f32,
    /// Yaw upper limit [rad]; ignored when `has_yaw_limits` is false.
    #[serde(default = "default_yaw_max")]
    pub yaw_max: f32,
    /// Whether yaw is physically limited (false = 360° slip ring).
    #[serde(default)]
    pub has_yaw_limits: bool,
    /// Software margin kept away from the hard limits [rad].
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence(),
            max_ttl: default_max_ttl(),
            default_radius: default_radius(),
        }
    }
}

impl Default for PfConfig {
    fn default() -> Self {
        Self {
            particle_count: default_particle_count(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            initial_bullet_speed: default_bullet_speed(),
            t_gimbal_actuation: default_t_gimbal(),
            tolerance_coeff: default_tolerance_coeff(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: default_serial_device(),
            baud: default_baud(),
        }
    }
}

impl Default for GimbalConfig {
    fn default() -> Self {
        Self {
            pitch_min: -0.17,
            pitch_max: 0.87,
            yaw_min: default_yaw_min(),
            yaw_max: default_yaw_max(),
            has_yaw_limits: false,
            safety_margin: default_safety_margin(),
        }
    }
}

fn default_confidence() -> f32 {
    consts::CONFIDENCE_THRESHOLD_DEFAULT
}
fn default_max_ttl() -> f32 {
    consts::MAX_TTL_DEFAULT_S
}
fn default_radius() -> f32 {
    consts::DEFAULT_RADIUS_M
}
fn default_particle_count() -> usize {
    consts::PARTICLE_COUNT_DEFAULT
}
fn default_bullet_speed() -> f32 {
    consts::BULLET_SPEED_DEFAULT
}
fn default_t_gimbal() -> f32 {
    consts::T_GIMBAL_ACTUATION_DEFAULT_S
}
fn default_tolerance_coeff() -> f32 {
    consts::TOLERANCE_COEFF_DEFAULT
}
fn default_serial_device() -> String {
    consts::DEFAULT_SERIAL_DEVICE.to_string()
}
fn default_baud() -> u32 {
    consts::DEFAULT_BAUD
}
fn default_yaw_min() -> f32 {
    -crate::angles::PI
}
fn default_yaw_max() -> f32 {
    crate::angles::PI
}
fn default_safety_margin() -> f32 {
    0.05
}

/// Full pipeline configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Instance identity and log verbosity.
    pub shared: ServiceConfig,
    /// Detection stage.
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Particle filter stage.
    #[serde(default)]
    pub pf: PfConfig,
    /// Prediction stage.
    #[serde(default)]
    pub prediction: PredictionConfig,
    /// MCU serial link.
    #[serde(default)]
    pub serial: SerialConfig,
    /// Calibrated gimbal limits.
    #[serde(default)]
    pub gimbal: GimbalConfig,
}

impl PipelineConfig {
    /// Validate all sections.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shared.service_name.is_empty() {
            return Err(ConfigError::Invalid(
                "shared.service_name cannot be empty".to_string(),
            ));
        }
        let det = &self.detection;
        if !(0.0..=1.0).contains(&det.confidence_threshold) {
            return Err(ConfigError::Invalid(
                "detection.confidence_threshold must be in [0, 1]".to_string(),
            ));
        }
        if det.max_ttl <= 0.0 {
            return Err(ConfigError::Invalid(
                "detection.max_ttl must be positive".to_string(),
            ));
        }
        if det.default_radius <= 0.0 {
            return Err(ConfigError::Invalid(
                "detection.default_radius must be positive".to_string(),
            ));
        }
        if self.pf.particle_count == 0 {
            return Err(ConfigError::Invalid(
                "pf.particle_count must be positive".to_string(),
            ));
        }
        if self.prediction.initial_bullet_speed <= 0.0 {
            return Err(ConfigError::Invalid(
                "prediction.initial_bullet_speed must be positive".to_string(),
            ));
        }
        if self.serial.device.is_empty() {
            return Err(ConfigError::Invalid(
                "serial.device cannot be empty".to_string(),
            ));
        }
        let g = &self.gimbal;
        if g.pitch_min >= g.pitch_max {
            return Err(ConfigError::Invalid(
                "gimbal.pitch_min must be below gimbal.pitch_max".to_string(),
            ));
        }
        if g.safety_margin < 0.0 {
            return Err(ConfigError::Invalid(
                "gimbal.safety_margin cannot be negative".to_string(),
            ));
        }
        if 2.0 * g.safety_margin >= g.pitch_max - g.pitch_min {
            return Err(ConfigError::Invalid(
                "gimbal.safety_margin consumes the whole pitch range".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads a `Deserialize` type from YAML, as a file or as raw text.
///
/// Blanket-implemented for every `DeserializeOwned` type, so any struct
/// in this module (or a caller's own) can be loaded the same way. Read
/// failures keep the offending path in the error.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Read and parse a YAML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse YAML text directly (calibration artifacts, tests).
    fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Syntax(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn minimal_config() -> PipelineConfig {
        PipelineConfig {
            shared: ServiceConfig {
                log_level: LogLevel::Info,
                service_name: "autoaim-test".to_string(),
            },
            detection: DetectionConfig::default(),
            pf: PfConfig::default(),
            prediction: PredictionConfig::default(),
            serial: SerialConfig::default(),
            gimbal: GimbalConfig::default(),
        }
    }

    #[test]
    fn minimal_yaml_loads_with_defaults() {
        let config = PipelineConfig::from_yaml(
            "shared:\n  service_name: sentry-01\n  log_level: debug\n",
        )
        .unwrap();
        assert_eq!(config.shared.service_name, "sentry-01");
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.serial.device, "/dev/ttyUSB0");
        assert_eq!(config.pf.particle_count, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_load_overrides_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "shared:\n  service_name: sentry-02\n\
             detection:\n  max_ttl: 0.5\n  confidence_threshold: 0.7\n\
             serial:\n  device: /dev/ttyACM0\n  baud: 460800\n\
             gimbal:\n  pitch_min: -0.2\n  pitch_max: 0.9\n  has_yaw_limits: true\n"
        )
        .unwrap();
        file.flush().unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.detection.max_ttl, 0.5);
        assert_eq!(config.serial.device, "/dev/ttyACM0");
        assert!(config.gimbal.has_yaw_limits);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_reports_path() {
        let result = PipelineConfig::load(Path::new("/nonexistent/autoaim.yaml"));
        match result {
            Err(ConfigError::Unreadable { path, .. }) => {
                assert_eq!(path, Path::new("/nonexistent/autoaim.yaml"));
            }
            other => panic!("expected Unreadable, got {other:?}"),
        }
    }

    #[test]
    fn broken_yaml_is_a_syntax_error() {
        let result = PipelineConfig::from_yaml("shared: [not a mapping");
        assert!(matches!(result, Err(ConfigError::Syntax(_))));
    }

    #[test]
    fn wrong_schema_is_a_syntax_error() {
        // Parses as YAML but the section has the wrong shape.
        let result = PipelineConfig::from_yaml("shared: 17\n");
        assert!(matches!(result, Err(ConfigError::Syntax(_))));
    }

    #[test]
    fn validation_rejects_empty_service_name() {
        let mut config = minimal_config();
        config.shared.service_name.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validation_rejects_inverted_pitch_limits() {
        let mut config = minimal_config();
        config.gimbal.pitch_min = 1.0;
        config.gimbal.pitch_max = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_excessive_margin() {
        let mut config = minimal_config();
        config.gimbal.pitch_min = -0.1;
        config.gimbal.pitch_max = 0.1;
        config.gimbal.safety_margin = 0.15;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_particles() {
        let mut config = minimal_config();
        config.pf.particle_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn log_level_parses_lowercase() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            level: LogLevel,
        }
        for (text, expected) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let w = Wrapper::from_yaml(&format!("level: {text}")).unwrap();
            assert_eq!(w.level, expected);
        }
    }
}
