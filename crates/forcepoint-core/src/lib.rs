//! # forcepoint core
//!
//! Point-of-application (POA) estimation for a rigid tool fitted with a
//! six-axis force/torque sensor.
//!
//! Given a force `F` and a moment `M` measured about a fixed reference origin,
//! the solver finds the contact point `r` inside the tool's bounding box that
//! best explains the measurement:
//!
//! ```text
//! minimize    ‖ (r - origin) × F - M ‖
//! subject to  r ∈ [x_min, x_max] × [y_min, y_max] × [z_min, z_max]
//! ```
//!
//! ## Modules
//!
//! - [`math`]: Bounded Nelder-Mead minimizer and rounding helpers
//! - [`wrench`]: Force/moment pairs and sensor record parsing
//! - [`solver`]: The POA solver and its `find_r` boundary
//! - [`calibration`]: Display-frame rotation and translation
//! - [`gate`]: Validity gate producing the no-contact sentinel
//! - [`smoothing`]: Fixed-window running-sum moving averages
//! - [`estimator`]: Solver + calibration + gate composed per sample
//! - [`config`]: Serde configuration tree

pub mod math;
pub mod wrench;
pub mod config;
pub mod solver;
pub mod calibration;
pub mod gate;
pub mod smoothing;
pub mod estimator;

// Common type aliases
use nalgebra::{Matrix3, Vector2, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f64>;

/// 2D vector type (display plane)
pub type Vec2 = Vector2<f64>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f64>;

/// Metres to centimetres
pub const CM_PER_M: f64 = 100.0;

pub use calibration::{CalibrationError, DisplayTransform};
pub use config::{ConfigError, PoaConfig};
pub use estimator::{Estimate, PoaEstimator};
pub use gate::{ForceGate, GateOutcome, GateSense, NoContactReason, ValidityGate};
pub use smoothing::MovingAverage;
pub use solver::{PoaSolution, PoaSolver, SolverError};
pub use wrench::{ParseError, Wrench};
