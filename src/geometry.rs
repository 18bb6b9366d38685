//! Link geometry helpers: the shoulder-wrist reference plane and the
//! Rodrigues rotation building blocks used by the coefficient builder.

use nalgebra::{Matrix3, Vector3};

use crate::types::approx_zero;

/// Skew-symmetric cross-product matrix of `v`, so that `skew(v) * x == v.cross(&x)`.
pub fn skew(v: Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// An orthonormal basis `(n_ref, e_b)` spanning the plane perpendicular to
/// `u`, used as the psi=0 reference plane for the arm-angle parameterization.
///
/// Falls back to `fallback_normal` when `u` is (near-)vertical, since the
/// natural choice (project the world vertical) degenerates there.
pub fn reference_plane(u: Vector3<f64>, fallback_normal: Option<Vector3<f64>>) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let vertical = Vector3::z();
    let raw = vertical - u * vertical.dot(&u);
    let n_ref = if raw.norm() > 1e-6 {
        raw.normalize()
    } else {
        let fb = fallback_normal?;
        let raw_fb = fb - u * fb.dot(&u);
        if raw_fb.norm() <= 1e-9 {
            return None;
        }
        raw_fb.normalize()
    };
    let e_b = u.cross(&n_ref).normalize();
    Some((n_ref, e_b))
}

/// Law-of-cosines angle at the vertex opposite `opposite`, between sides
/// `adjacent_a` and `adjacent_b`. Returns `None` if the triangle inequality
/// is violated (target out of reach).
pub fn law_of_cosines_angle(adjacent_a: f64, adjacent_b: f64, opposite: f64) -> Option<f64> {
    let cos_angle = (adjacent_a * adjacent_a + adjacent_b * adjacent_b - opposite * opposite)
        / (2.0 * adjacent_a * adjacent_b);
    if cos_angle < -1.0 - 1e-6 || cos_angle > 1.0 + 1e-6 {
        return None;
    }
    Some(cos_angle.clamp(-1.0, 1.0).acos())
}

/// True when a 3x3 matrix entry is psi-independent (coefficient builder
/// uses this to flag genuine pivot singularities).
pub fn entry_is_degenerate(a: f64, b: f64) -> bool {
    approx_zero(a) && approx_zero(b)
}
