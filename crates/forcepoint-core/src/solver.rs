//! Point-of-Application Solver
//!
//! Finds the contact point `r` on the tool whose lever arm best reproduces the
//! measured moment:
//!
//! ```text
//! r* = argmin  ‖ (r - origin) × F - M ‖
//!      r ∈ box
//! ```
//!
//! Only the component of `r - origin` perpendicular to `F` is observable,
//! since `(r + tF) × F = r × F`. The search box bounds the unobservable
//! direction and keeps the problem well posed when `F` is small.

use nalgebra::Vector3;
use thiserror::Error;

use crate::config::{ConfigError, OutputConfig, SolverConfig};
use crate::math::{round_vec3, BoxBounds, NelderMead};
use crate::wrench::Wrench;

/// Solver errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("non-finite force/moment input: {0}")]
    NonFiniteInput(Wrench),
    #[error("minimizer failed: {0}")]
    Optimizer(String),
}

/// Raw minimization result in solver units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoaSolution {
    /// Estimated point of application, tool frame [m]
    pub point: Vector3<f64>,
    /// Residual torque norm at `point` [N·m]
    pub residual: f64,
    /// Simplex iterations used
    pub iterations: usize,
    /// Objective evaluations used
    pub evaluations: usize,
    /// Whether the minimizer met its tolerances
    pub converged: bool,
}

/// Bounded point-of-application solver
///
/// Holds only immutable calibration; `solve` takes `&self` and the solver can
/// be shared between threads.
#[derive(Debug, Clone)]
pub struct PoaSolver {
    /// Moment reference point [m]
    origin: Vector3<f64>,
    /// Search start [m]
    start: Vector3<f64>,
    /// Search box [m]
    bounds: BoxBounds<3>,
    /// Minimizer
    minimizer: NelderMead,
    /// Solver units → reported units
    scale: f64,
    /// Reported decimal places
    decimals: u32,
}

impl Default for PoaSolver {
    fn default() -> Self {
        let config = SolverConfig::default();
        let output = OutputConfig::default();
        Self::from_parts(&config, &output)
    }
}

impl PoaSolver {
    /// Create a solver from validated configuration
    pub fn new(config: &SolverConfig, output: &OutputConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        output.validate()?;
        Ok(Self::from_parts(config, output))
    }

    fn from_parts(config: &SolverConfig, output: &OutputConfig) -> Self {
        Self {
            origin: config.origin,
            start: config.start(),
            bounds: config.bounds.to_box(),
            minimizer: NelderMead::new(config.minimizer.clone()),
            scale: output.scale,
            decimals: output.decimals,
        }
    }

    pub fn origin(&self) -> &Vector3<f64> {
        &self.origin
    }

    pub fn bounds(&self) -> &BoxBounds<3> {
        &self.bounds
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Residual torque norm for candidate point `r`
    ///
    /// ‖(r - origin) × F - M‖
    pub fn objective(&self, r: &Vector3<f64>, wrench: &Wrench) -> f64 {
        residual(&self.origin, r, wrench)
    }

    /// Minimize the residual torque inside the search box
    ///
    /// Non-convergence is not an error: the best point found is returned with
    /// `converged = false`.
    pub fn solve(&self, wrench: &Wrench) -> Result<PoaSolution, SolverError> {
        if !wrench.is_finite() {
            return Err(SolverError::NonFiniteInput(*wrench));
        }

        let origin = self.origin;
        let min = self.minimizer.minimize(
            |r: &Vector3<f64>| residual(&origin, r, wrench),
            &self.start,
            &self.bounds,
        )
        .map_err(|e| SolverError::Optimizer(e.to_string()))?;

        if !min.converged() {
            log::debug!(
                "POA search stopped ({:?}) after {} iterations, residual {:.3e}",
                min.termination,
                min.iterations,
                min.value
            );
        }

        Ok(PoaSolution {
            point: min.point,
            residual: min.value,
            iterations: min.iterations,
            evaluations: min.evaluations,
            converged: min.converged(),
        })
    }

    /// Convert a solver-unit point to reported units (no rounding)
    pub fn scaled(&self, point: &Vector3<f64>) -> Vector3<f64> {
        point * self.scale
    }

    /// Point of application in reported units, rounded
    ///
    /// # Arguments
    /// * `force` - Measured force
    /// * `moment` - Measured moment about the reference origin
    ///
    /// # Returns
    /// Tool-frame point in centimetres (default output), each component
    /// rounded to one decimal place.
    pub fn find_r(
        &self,
        force: &Vector3<f64>,
        moment: &Vector3<f64>,
    ) -> Result<Vector3<f64>, SolverError> {
        let solution = self.solve(&Wrench::new(*force, *moment))?;
        Ok(round_vec3(&self.scaled(&solution.point), self.decimals))
    }
}

fn residual(origin: &Vector3<f64>, r: &Vector3<f64>, wrench: &Wrench) -> f64 {
    ((r - origin).cross(&wrench.force) - wrench.moment).norm()
}

/// [`PoaSolver::find_r`] with the default device-head geometry
pub fn find_r(force: &Vector3<f64>, moment: &Vector3<f64>) -> Result<Vector3<f64>, SolverError> {
    PoaSolver::default().find_r(force, moment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_objective_zero_at_true_point() {
        let solver = PoaSolver::default();
        let r_true = Vector3::new(0.04, -0.02, 0.01);
        let wrench = Wrench::applied_at(&(r_true - solver.origin()), Vector3::new(1.0, 2.0, -6.0));

        assert_relative_eq!(solver.objective(&r_true, &wrench), 0.0, epsilon = 1e-12);
        assert!(solver.objective(&Vector3::zeros(), &wrench) > 0.0);
    }

    #[test]
    fn test_objective_invariant_along_force() {
        let solver = PoaSolver::default();
        let force = Vector3::new(0.0, 0.0, -5.0);
        let wrench = Wrench::new(force, Vector3::new(0.1, -0.2, 0.0));
        let r = Vector3::new(0.01, 0.02, 0.03);

        assert_relative_eq!(
            solver.objective(&r, &wrench),
            solver.objective(&(r + force * 0.001), &wrench),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_zero_wrench_stays_at_origin() {
        let solver = PoaSolver::default();
        let solution = solver.solve(&Wrench::zeros()).unwrap();

        assert!(solution.converged);
        assert!(solver.bounds().contains(&solution.point));
        assert_relative_eq!(solution.point, *solver.origin(), epsilon = 1e-9);
        assert_eq!(
            solver.find_r(&Vector3::zeros(), &Vector3::zeros()).unwrap(),
            Vector3::new(0.0, 0.0, 5.0)
        );
    }

    #[test]
    fn test_straight_down_force() {
        let r = find_r(&Vector3::new(0.0, 0.0, -5.0), &Vector3::zeros()).unwrap();
        assert_eq!(r.x, 0.0);
        assert_eq!(r.y, 0.0);
    }

    #[test]
    fn test_recovers_contact_xy() {
        let solver = PoaSolver::default();
        let r_true = Vector3::new(0.05, -0.03, 0.02);
        let wrench = Wrench::applied_at(&(r_true - solver.origin()), Vector3::new(0.0, 0.0, -8.0));

        let solution = solver.solve(&wrench).unwrap();
        assert_relative_eq!(solution.point.x, r_true.x, epsilon = 1e-3);
        assert_relative_eq!(solution.point.y, r_true.y, epsilon = 1e-3);
        // 1 mm lateral error under 8 N
        assert!(solution.residual < 8.0 * 1e-3);
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let solver = PoaSolver::default();
        let wrench = Wrench::new(Vector3::new(f64::NAN, 0.0, -1.0), Vector3::zeros());
        assert!(matches!(
            solver.solve(&wrench),
            Err(SolverError::NonFiniteInput(_))
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SolverConfig::default();
        config.bounds.z = (0.05, 0.0);
        assert!(PoaSolver::new(&config, &OutputConfig::default()).is_err());
    }

    #[test]
    fn test_solver_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PoaSolver>();
    }
}
