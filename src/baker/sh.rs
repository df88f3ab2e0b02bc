//! Spherical Harmonics
//!
//! Order-3 real SH basis (9 coefficients) used to encode the baked
//! diffuse-indirect irradiance of one probe.

use glam::Vec3;

/// Number of coefficients of the order-3 basis.
pub const SH_COEFF_COUNT: usize = 9;

/// Evaluates the 9 real SH basis functions in `dir` (unit length).
#[must_use]
pub fn eval_sh9_basis(dir: Vec3) -> [f32; SH_COEFF_COUNT] {
    let Vec3 { x, y, z } = dir;
    [
        0.282_095,                            // l=0
        0.488_603 * y,                        // l=1, m=-1
        0.488_603 * z,                        // l=1, m=0
        0.488_603 * x,                        // l=1, m=1
        1.092_548 * x * y,                    // l=2, m=-2
        1.092_548 * y * z,                    // l=2, m=-1
        0.315_392 * (3.0 * z * z - 1.0),      // l=2, m=0
        1.092_548 * x * z,                    // l=2, m=1
        0.546_274 * (x * x - y * y),          // l=2, m=2
    ]
}

/// Accumulates one radiance sample taken in direction `dir` onto the
/// probe's coefficients.
pub fn project_sh9(dir: Vec3, radiance: Vec3, coefficients: &mut [Vec3; SH_COEFF_COUNT]) {
    let basis = eval_sh9_basis(dir);
    for (coefficient, weight) in coefficients.iter_mut().zip(basis) {
        *coefficient += radiance * weight;
    }
}
