//! Per-sample POA estimation
//!
//! Composes solver, display calibration and validity gate:
//!
//! ```text
//! (F, M) ──solve──▶ r [m] ──×scale──▶ r_cm ──R·r+T──▶ display ──gate──▶ marker
//! ```
//!
//! Reported points are rounded after the transform.

use nalgebra::{Vector2, Vector3};

use crate::calibration::DisplayTransform;
use crate::config::{ConfigError, PoaConfig};
use crate::gate::{GateOutcome, ValidityGate};
use crate::math::round_vec3;
use crate::solver::{PoaSolution, PoaSolver, SolverError};
use crate::wrench::Wrench;

/// Result of one estimation cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Wrench the estimate was computed from
    pub wrench: Wrench,
    /// Raw solver result (tool frame, metres)
    pub solution: PoaSolution,
    /// Tool-frame point in output units, rounded
    pub local: Vector3<f64>,
    /// Display-frame point, rounded
    pub display: Vector3<f64>,
    /// Gate decision
    pub outcome: GateOutcome,
}

impl Estimate {
    pub fn is_contact(&self) -> bool {
        self.outcome.is_contact()
    }

    /// Marker x/y; `(0, 0)` when gated out
    pub fn marker(&self) -> Vector2<f64> {
        self.outcome.marker()
    }
}

/// Solver + calibration + gate
#[derive(Debug, Clone)]
pub struct PoaEstimator {
    solver: PoaSolver,
    transform: DisplayTransform,
    gate: ValidityGate,
}

impl PoaEstimator {
    pub fn new(solver: PoaSolver, transform: DisplayTransform, gate: ValidityGate) -> Self {
        Self {
            solver,
            transform,
            gate,
        }
    }

    /// Build every component from configuration
    ///
    /// Fails if the configuration is inconsistent or a configured calibration
    /// file cannot be loaded.
    pub fn from_config(config: &PoaConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let solver = PoaSolver::new(&config.solver, &config.output)?;
        let transform = DisplayTransform::from_config(&config.calibration)?;
        let gate = ValidityGate::from_config(&config.gate);

        log::info!(
            "POA estimator ready: origin {:?}, display transform {}, \
             gate extent {}, force gate {:?}",
            solver.origin().as_slice(),
            if transform.is_identity() { "identity" } else { "calibrated" },
            gate.extent(),
            gate.force()
        );

        Ok(Self::new(solver, transform, gate))
    }

    pub fn solver(&self) -> &PoaSolver {
        &self.solver
    }

    pub fn transform(&self) -> &DisplayTransform {
        &self.transform
    }

    pub fn gate(&self) -> &ValidityGate {
        &self.gate
    }

    /// Run one estimation cycle
    pub fn estimate(&self, wrench: &Wrench) -> Result<Estimate, SolverError> {
        let solution = self.solver.solve(wrench)?;
        let decimals = self.solver.decimals();

        let scaled = self.solver.scaled(&solution.point);
        let local = round_vec3(&scaled, decimals);
        let display = round_vec3(&self.transform.apply(&scaled), decimals);
        let outcome = self.gate.evaluate(&display, &wrench.force);

        Ok(Estimate {
            wrench: *wrench,
            solution,
            local,
            display,
            outcome,
        })
    }
}
