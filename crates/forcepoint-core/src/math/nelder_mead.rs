//! Box-constrained Nelder-Mead simplex minimization
//!
//! Runs argmin's Nelder-Mead on an unconstrained parameter `u` that is mapped
//! smoothly into the box before every objective evaluation:
//!
//! ```text
//! both bounds:   x = lo + (hi - lo) · (sin u + 1) / 2
//! lower only:    x = lo - 1 + sqrt(u² + 1)
//! upper only:    x = hi + 1 - sqrt(u² + 1)
//! unbounded:     x = u
//! ```
//!
//! Every trial point is therefore inside the box, and the simplex keeps its
//! full dimension when the minimum lies on or next to a face.
//!
//! Coefficients are argmin's defaults:
//! ```text
//! reflection 1, expansion 2, contraction 0.5, shrink 0.5
//! ```

use argmin::core::{CostFunction, Error, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead as SimplexSolver;
use nalgebra::SVector;
use serde::{Deserialize, Serialize};

/// Relative perturbation of non-zero coordinates in the initial simplex
const NONZERO_DELTA: f64 = 0.05;
/// Absolute perturbation of zero coordinates in the initial simplex
const ZERO_DELTA: f64 = 0.00025;

/// Axis-aligned box in N dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxBounds<const N: usize> {
    /// Lower corner
    pub lower: SVector<f64, N>,
    /// Upper corner
    pub upper: SVector<f64, N>,
}

impl<const N: usize> BoxBounds<N> {
    pub fn new(lower: SVector<f64, N>, upper: SVector<f64, N>) -> Self {
        Self { lower, upper }
    }

    /// Box covering all of R^N
    pub fn unbounded() -> Self {
        Self {
            lower: SVector::repeat(f64::NEG_INFINITY),
            upper: SVector::repeat(f64::INFINITY),
        }
    }

    /// Clip a point into the box
    pub fn clamp(&self, x: &SVector<f64, N>) -> SVector<f64, N> {
        x.zip_zip_map(&self.lower, &self.upper, |v, lo, hi| v.max(lo).min(hi))
    }

    /// Whether the point lies inside the box (faces included)
    pub fn contains(&self, x: &SVector<f64, N>) -> bool {
        (0..N).all(|k| x[k] >= self.lower[k] && x[k] <= self.upper[k])
    }

    /// Unconstrained parameters of a point inside the box
    pub fn to_unconstrained(&self, x: &SVector<f64, N>) -> Vec<f64> {
        (0..N)
            .map(|k| unconstrained_coordinate(x[k], self.lower[k], self.upper[k]))
            .collect()
    }

    /// Point in the box for unconstrained parameters `u` (length N)
    pub fn from_unconstrained(&self, u: &[f64]) -> SVector<f64, N> {
        let x = SVector::from_fn(|k, _| boxed_coordinate(u[k], self.lower[k], self.upper[k]));
        // sin/sqrt round-off must not leave the box
        self.clamp(&x)
    }
}

fn boxed_coordinate(u: f64, lo: f64, hi: f64) -> f64 {
    match (lo.is_finite(), hi.is_finite()) {
        (true, true) if hi > lo => lo + (hi - lo) * (u.sin() + 1.0) * 0.5,
        (true, true) => lo,
        (true, false) => lo - 1.0 + (u * u + 1.0).sqrt(),
        (false, true) => hi + 1.0 - (u * u + 1.0).sqrt(),
        (false, false) => u,
    }
}

fn unconstrained_coordinate(x: f64, lo: f64, hi: f64) -> f64 {
    match (lo.is_finite(), hi.is_finite()) {
        (true, true) if hi > lo => (2.0 * (x - lo) / (hi - lo) - 1.0).clamp(-1.0, 1.0).asin(),
        (true, true) => 0.0,
        (true, false) => {
            let d = x - lo + 1.0;
            (d * d - 1.0).max(0.0).sqrt()
        }
        (false, true) => {
            let d = hi - x + 1.0;
            (d * d - 1.0).max(0.0).sqrt()
        }
        (false, false) => x,
    }
}

/// Stopping criteria for [`NelderMead`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMeadOptions {
    /// Maximum number of simplex iterations
    pub max_iterations: u64,
    /// Converged once the standard deviation of the vertex objective values
    /// falls below this
    pub sd_tolerance: f64,
}

impl NelderMeadOptions {
    /// Budget scaled to the problem dimension (200 per dimension)
    pub fn for_dimension(n: usize) -> Self {
        Self {
            max_iterations: 200 * n as u64,
            sd_tolerance: 1e-8,
        }
    }
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self::for_dimension(3)
    }
}

/// Why the minimizer stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Objective spread below tolerance
    Converged,
    /// Iteration budget exhausted
    MaxIterations,
    /// Any other executor stop
    Stopped,
}

/// Result of a minimization
///
/// `point` is always the best point found, whatever the termination reason.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum<const N: usize> {
    /// Best point found
    pub point: SVector<f64, N>,
    /// Objective value at `point`
    pub value: f64,
    /// Number of simplex iterations performed
    pub iterations: usize,
    /// Number of objective evaluations performed
    pub evaluations: usize,
    /// Stopping reason
    pub termination: Termination,
}

impl<const N: usize> Minimum<N> {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Objective seen by argmin: `f` composed with the box mapping
///
/// NaN is mapped to +∞ so that it always ranks worst in the simplex.
struct BoxedObjective<F, const N: usize> {
    f: F,
    bounds: BoxBounds<N>,
}

impl<F, const N: usize> CostFunction for BoxedObjective<F, N>
where
    F: Fn(&SVector<f64, N>) -> f64,
{
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, u: &Self::Param) -> Result<Self::Output, Error> {
        let value = (self.f)(&self.bounds.from_unconstrained(u));
        Ok(if value.is_nan() { f64::INFINITY } else { value })
    }
}

/// Box-constrained Nelder-Mead minimizer
///
/// Stateless apart from its options; one instance can be reused for any
/// number of problems and shared between threads.
#[derive(Debug, Clone, Default)]
pub struct NelderMead {
    options: NelderMeadOptions,
}

impl NelderMead {
    pub fn new(options: NelderMeadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NelderMeadOptions {
        &self.options
    }

    /// Minimize `f` inside `bounds` starting from `x0`
    ///
    /// # Arguments
    /// * `f` - Objective function
    /// * `x0` - Initial guess (clipped into `bounds` first)
    /// * `bounds` - Box every trial point is mapped into
    ///
    /// # Returns
    /// The best point found. Running out of budget is not an error: the best
    /// point so far is returned with the matching [`Termination`]. Errors
    /// only come from argmin itself (e.g. a negative tolerance).
    pub fn minimize<const N: usize, F>(
        &self,
        f: F,
        x0: &SVector<f64, N>,
        bounds: &BoxBounds<N>,
    ) -> Result<Minimum<N>, Error>
    where
        F: Fn(&SVector<f64, N>) -> f64,
    {
        let x0 = bounds.clamp(x0);
        let simplex: Vec<Vec<f64>> = initial_simplex(&x0, bounds)
            .iter()
            .map(|v| bounds.to_unconstrained(v))
            .collect();

        let solver = SimplexSolver::new(simplex).with_sd_tolerance(self.options.sd_tolerance)?;
        let objective = BoxedObjective { f, bounds: *bounds };
        let result = Executor::new(objective, solver)
            .configure(|state| state.max_iters(self.options.max_iterations))
            .run()?;

        let state = result.state();
        let point = state
            .get_best_param()
            .map(|u| bounds.from_unconstrained(u))
            .unwrap_or(x0);
        let termination = match state.get_termination_status() {
            TerminationStatus::Terminated(TerminationReason::SolverConverged) => {
                Termination::Converged
            }
            TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
                Termination::MaxIterations
            }
            _ => Termination::Stopped,
        };
        let evaluations = state
            .get_func_counts()
            .get("cost_count")
            .copied()
            .unwrap_or(0);

        Ok(Minimum {
            point,
            value: state.get_best_cost(),
            iterations: state.get_iter() as usize,
            evaluations: evaluations as usize,
            termination,
        })
    }
}

/// Build the starting simplex around `x0`
///
/// Each axis gets one vertex with that coordinate scaled by 1.05 (or set to
/// 0.00025 when zero). A vertex pushed past an upper bound is mirrored back
/// inside so a start on a face still spans the box.
fn initial_simplex<const N: usize>(
    x0: &SVector<f64, N>,
    bounds: &BoxBounds<N>,
) -> Vec<SVector<f64, N>> {
    let mut simplex = Vec::with_capacity(N + 1);
    simplex.push(*x0);
    for k in 0..N {
        let mut vertex = *x0;
        vertex[k] = if vertex[k] != 0.0 {
            (1.0 + NONZERO_DELTA) * vertex[k]
        } else {
            ZERO_DELTA
        };
        simplex.push(vertex);
    }

    for vertex in simplex.iter_mut() {
        for k in 0..N {
            if vertex[k] > bounds.upper[k] {
                vertex[k] = 2.0 * bounds.upper[k] - vertex[k];
            }
        }
        *vertex = bounds.clamp(vertex);
    }

    simplex
}
