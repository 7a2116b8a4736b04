//! Estimator configuration
//!
//! Calibration constants (reference origin, search box, display transform,
//! gate thresholds) are gathered in one [`PoaConfig`] value that is built once
//! at startup and handed to the components that need it.

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calibration::CalibrationError;
use crate::gate::ForceGate;
use crate::math::{BoxBounds, NelderMeadOptions};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

/// Top-level estimator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoaConfig {
    /// Solver geometry and stopping criteria
    pub solver: SolverConfig,
    /// Unit conversion and rounding of reported points
    pub output: OutputConfig,
    /// Display-frame calibration source
    pub calibration: CalibrationConfig,
    /// Validity gate
    pub gate: GateConfig,
    /// Moving-average windows used by the live loop
    pub smoothing: SmoothingConfig,
}

impl PoaConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PoaConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check internal consistency of every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.solver.validate()?;
        self.output.validate()?;
        self.gate.validate()?;
        self.smoothing.validate()?;
        Ok(())
    }
}

/// Axis-aligned search box in tool-local coordinates [m]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchBounds {
    pub x: (f64, f64),
    pub y: (f64, f64),
    pub z: (f64, f64),
}

impl Default for SearchBounds {
    fn default() -> Self {
        // Physical extent of the device head
        Self {
            x: (-0.15, 0.15),
            y: (-0.15, 0.15),
            z: (0.0, 0.05),
        }
    }
}

impl SearchBounds {
    pub fn lower(&self) -> Vector3<f64> {
        Vector3::new(self.x.0, self.y.0, self.z.0)
    }

    pub fn upper(&self) -> Vector3<f64> {
        Vector3::new(self.x.1, self.y.1, self.z.1)
    }

    pub fn to_box(&self) -> BoxBounds<3> {
        BoxBounds::new(self.lower(), self.upper())
    }

    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        self.to_box().contains(p)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (axis, (lo, hi)) in [("x", self.x), ("y", self.y), ("z", self.z)] {
            if !(lo.is_finite() && hi.is_finite()) {
                return Err(ConfigError::Invalid(format!("bounds.{axis} must be finite")));
            }
            if lo > hi {
                return Err(ConfigError::Invalid(format!(
                    "bounds.{axis} lower {lo} exceeds upper {hi}"
                )));
            }
        }
        Ok(())
    }
}

/// Solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Point about which the sensor reports moments [m]
    pub origin: Vector3<f64>,
    /// Starting point of the search; `None` starts at `origin`
    pub initial_guess: Option<Vector3<f64>>,
    /// Search box
    pub bounds: SearchBounds,
    /// Minimizer stopping criteria
    #[serde(flatten)]
    pub minimizer: NelderMeadOptions,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            origin: Vector3::new(0.0, 0.0, 0.05),
            initial_guess: None,
            bounds: SearchBounds::default(),
            minimizer: NelderMeadOptions::for_dimension(3),
        }
    }
}

impl SolverConfig {
    /// Effective starting point
    pub fn start(&self) -> Vector3<f64> {
        self.initial_guess.unwrap_or(self.origin)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;
        if !self.origin.iter().all(|c| c.is_finite()) {
            return Err(ConfigError::Invalid("solver.origin must be finite".into()));
        }
        if !self.start().iter().all(|c| c.is_finite()) {
            return Err(ConfigError::Invalid("solver.initial_guess must be finite".into()));
        }
        let m = &self.minimizer;
        if m.max_iterations == 0 {
            return Err(ConfigError::Invalid("solver.max_iterations must be positive".into()));
        }
        if !(m.sd_tolerance > 0.0 && m.sd_tolerance.is_finite()) {
            return Err(ConfigError::Invalid("solver.sd_tolerance must be positive".into()));
        }
        Ok(())
    }
}

/// Reported point units and precision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Factor from solver units to reported units (m → cm)
    pub scale: f64,
    /// Decimal places kept in reported coordinates
    pub decimals: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            scale: crate::CM_PER_M,
            decimals: 1,
        }
    }
}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ConfigError::Invalid("output.scale must be positive".into()));
        }
        if self.decimals > 12 {
            return Err(ConfigError::Invalid("output.decimals must be at most 12".into()));
        }
        Ok(())
    }
}

/// Where the display transform comes from
///
/// `.npy` paths take precedence over inline arrays. With nothing configured
/// the display frame equals the tool frame (in output units).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// 3x3 rotation array file
    pub rotation_npy: Option<PathBuf>,
    /// 3-element translation array file
    pub translation_npy: Option<PathBuf>,
    /// Inline rotation, row-major
    pub rotation: Option<[[f64; 3]; 3]>,
    /// Inline translation
    pub translation: Option<[f64; 3]>,
}

/// Validity gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Disable to report every estimate as contact
    pub enabled: bool,
    /// Half-width of the accepted display region (display units)
    pub extent: f64,
    /// Activation gate on the z force; `None` disables the force check.
    /// The sign convention depends on the sensor mounting.
    pub force: Option<ForceGate>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extent: 15.0,
            force: None,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.extent > 0.0) {
            return Err(ConfigError::Invalid("gate.extent must be positive".into()));
        }
        if let Some(force) = &self.force {
            if !force.threshold.is_finite() {
                return Err(ConfigError::Invalid("gate.force.threshold must be finite".into()));
            }
        }
        Ok(())
    }
}

/// Moving-average window lengths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Samples averaged for force and moment
    pub wrench_window: usize,
    /// Estimates averaged for the display point
    pub point_window: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            wrench_window: 6,
            point_window: 20,
        }
    }
}

impl SmoothingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wrench_window == 0 || self.point_window == 0 {
            return Err(ConfigError::Invalid("smoothing windows must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateSense;

    #[test]
    fn test_defaults_match_device_head() {
        let config = PoaConfig::default();
        assert_eq!(config.solver.origin, Vector3::new(0.0, 0.0, 0.05));
        assert_eq!(config.solver.start(), config.solver.origin);
        assert_eq!(config.solver.bounds.z, (0.0, 0.05));
        assert_eq!(config.solver.minimizer.max_iterations, 600);
        assert_eq!(config.output.decimals, 1);
        assert_eq!(config.smoothing.wrench_window, 6);
        assert_eq!(config.smoothing.point_window, 20);
        assert!(config.gate.force.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let text = r#"
            [solver]
            max_iterations = 1000
            sd_tolerance = 1e-6

            [solver.bounds]
            x = [-0.1, 0.1]
            y = [-0.1, 0.1]
            z = [0.0, 0.04]

            [gate]
            extent = 12.0
            force = { sense = "below", threshold = -1.0 }
        "#;

        let config = PoaConfig::from_toml_str(text).unwrap();
        assert_eq!(config.solver.minimizer.max_iterations, 1000);
        assert_eq!(config.solver.minimizer.sd_tolerance, 1e-6);
        assert_eq!(config.solver.bounds.x, (-0.1, 0.1));
        assert_eq!(config.solver.origin, Vector3::new(0.0, 0.0, 0.05));
        assert_eq!(config.gate.extent, 12.0);

        let force = config.gate.force.unwrap();
        assert_eq!(force.sense, GateSense::Below);
        assert_eq!(force.threshold, -1.0);
    }

    #[test]
    fn test_inline_calibration_toml() {
        let text = r#"
            [calibration]
            rotation = [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]
            translation = [1.0, 2.0, 0.0]
        "#;

        let config = PoaConfig::from_toml_str(text).unwrap();
        assert_eq!(config.calibration.rotation.unwrap()[0], [0.0, -1.0, 0.0]);
        assert_eq!(config.calibration.translation, Some([1.0, 2.0, 0.0]));
        assert!(config.calibration.rotation_npy.is_none());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let text = r#"
            [solver.bounds]
            x = [0.1, -0.1]
            y = [-0.1, 0.1]
            z = [0.0, 0.05]
        "#;

        let err = PoaConfig::from_toml_str(text).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("bounds.x")));
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = PoaConfig::default();
        config.smoothing.wrench_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let mut config = PoaConfig::default();
        config.solver.minimizer.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = PoaConfig::default();
        config.solver.minimizer.sd_tolerance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_gate_sense_rejected() {
        let text = r#"
            [gate]
            force = { sense = "sideways", threshold = 1.0 }
        "#;
        assert!(matches!(
            PoaConfig::from_toml_str(text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = PoaConfig::from_file("/nonexistent/forcepoint.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
