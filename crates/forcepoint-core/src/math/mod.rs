//! Numerical utilities for forcepoint
//!
//! Derivative-free bounded minimization and fixed-precision rounding.

pub mod nelder_mead;
pub mod rounding;

pub use nelder_mead::*;
pub use rounding::*;
