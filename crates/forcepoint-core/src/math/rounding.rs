//! Fixed-precision rounding for reported coordinates

use nalgebra::Vector3;

/// Round to `decimals` places, half away from zero
///
/// Negative zero is folded to `0.0` so a point that rounds to the origin
/// never prints as `-0.0`.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor + 0.0
}

/// Round every component of a vector
pub fn round_vec3(v: &Vector3<f64>, decimals: u32) -> Vector3<f64> {
    v.map(|c| round_to(c, decimals))
}
