//! Per-joint closed-form functions of the arm angle psi.
//!
//! Each joint is either a *pivot* (angle = atan2 of two linear combinations
//! of sin(psi), cos(psi)) or a *hinge* (angle = +/- acos of a combination of
//! sin(psi), cos(psi), sin^2(psi), cos^2(psi), sin(psi)cos(psi)). The
//! coefficients are derived once per `(pose, global configuration)` pair by
//! rotating a fixed reference frame about the shoulder-wrist axis with
//! Rodrigues' formula, then read off by the interval engine and the solver
//! for every candidate psi without rebuilding any geometry.

use nalgebra::{Matrix3, Vector3};

use crate::geometry::{law_of_cosines_angle, reference_plane, skew};
use crate::types::{
    approx_zero, wrap_to_pi, GlobalConfiguration, JointKind, LinkGeometry, Pose, RLLKinMsg, ELBOW_JOINT,
    JOINT_KINDS, NUM_JOINTS, ZERO_ROUNDING_TOL,
};

/// `atan2(a*sin(psi) + b*cos(psi) + c, a2*sin(psi) + b2*cos(psi) + c2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PivotCoeffs {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub a2: f64,
    pub b2: f64,
    pub c2: f64,
}

impl PivotCoeffs {
    pub fn numerator(&self, psi: f64) -> f64 {
        let (s, co) = psi.sin_cos();
        self.a * s + self.b * co + self.c
    }

    pub fn denominator(&self, psi: f64) -> f64 {
        let (s, co) = psi.sin_cos();
        self.a2 * s + self.b2 * co + self.c2
    }

    pub fn eval(&self, psi: f64) -> f64 {
        self.numerator(psi).atan2(self.denominator(psi))
    }

    pub fn derivative(&self, psi: f64) -> f64 {
        let (s, co) = psi.sin_cos();
        let n = self.a * s + self.b * co + self.c;
        let d = self.a2 * s + self.b2 * co + self.c2;
        let n_prime = self.a * co - self.b * s;
        let d_prime = self.a2 * co - self.b2 * s;
        let denom = n * n + d * d;
        if denom <= ZERO_ROUNDING_TOL {
            return 0.0;
        }
        (d * n_prime - n * d_prime) / denom
    }

    /// A psi where numerator and denominator vanish simultaneously, making
    /// the joint angle undefined there (spec §4.2 pivot singularity).
    pub fn singularity(&self) -> Option<f64> {
        let det = self.a * self.b2 - self.b * self.a2;
        if det.abs() <= ZERO_ROUNDING_TOL {
            return None;
        }
        let s = (-self.c * self.b2 + self.c2 * self.b) / det;
        let co = (-self.a * self.c2 + self.a2 * self.c) / det;
        let norm = (s * s + co * co).sqrt();
        if (norm - 1.0).abs() > 1e-6 {
            return None;
        }
        Some(wrap_to_pi(s.atan2(co)))
    }
}

/// `sign * acos(a*sin(psi) + b*cos(psi) + c*sin^2(psi) + d*cos^2(psi) + e*sin(psi)cos(psi) + f)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HingeCoeffs {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
    pub sign: f64,
}

impl HingeCoeffs {
    pub fn value(&self, psi: f64) -> f64 {
        let (s, co) = psi.sin_cos();
        self.a * s + self.b * co + self.c * s * s + self.d * co * co + self.e * s * co + self.f
    }

    fn value_derivative(&self, psi: f64) -> f64 {
        let (s, co) = psi.sin_cos();
        self.a * co - self.b * s + 2.0 * (self.c - self.d) * s * co + self.e * (co * co - s * s)
    }

    pub fn eval(&self, psi: f64) -> f64 {
        self.sign * self.value(psi).clamp(-1.0, 1.0).acos()
    }

    /// Derivative of the joint angle, given the current measured angle to
    /// pick the correct branch of the acos derivative.
    pub fn derivative(&self, psi: f64, current_q: f64) -> f64 {
        let branch = if approx_zero(current_q) { self.sign } else { current_q.signum() };
        let v = self.value(psi).clamp(-1.0 + 1e-12, 1.0 - 1e-12);
        let dv = self.value_derivative(psi);
        -branch * dv / (1.0 - v * v).sqrt()
    }

    /// True when this hinge reduces to the linear special case (every joint
    /// in this chain's concrete geometry does; the quadratic terms exist in
    /// the general formula for completeness and future link topologies).
    pub fn is_linear(&self) -> bool {
        approx_zero(self.c) && approx_zero(self.d) && approx_zero(self.e)
    }
}

/// Up to two psi roots of `a*sin(psi) + b*cos(psi) = c`, wrapped to `[-pi, pi]`.
fn solve_sin_cos_equation(a: f64, b: f64, c: f64) -> Vec<f64> {
    let r = (a * a + b * b).sqrt();
    if r <= ZERO_ROUNDING_TOL {
        return Vec::new();
    }
    let ratio = (c / r).clamp(-1.0, 1.0);
    if (c / r).abs() > 1.0 + 1e-6 {
        return Vec::new();
    }
    let phi = b.atan2(a);
    let asin_term = ratio.asin();
    let psi1 = wrap_to_pi(asin_term - phi);
    let psi2 = wrap_to_pi(std::f64::consts::PI - asin_term - phi);
    let mut roots = vec![psi1];
    if (psi1 - psi2).abs() > 1e-9 && (psi1 - psi2).abs() < 2.0 * std::f64::consts::PI - 1e-9 {
        roots.push(psi2);
    }
    roots
}

/// Bracket-and-bisect fallback for the general (non-degenerate) quadratic
/// hinge case, which this chain's geometry never actually produces but
/// which the interface supports for completeness.
fn solve_hinge_value_equation(h: &HingeCoeffs, target: f64) -> Vec<f64> {
    const SAMPLES: usize = 720;
    let f = |psi: f64| h.value(psi) - target;
    let mut roots = Vec::new();
    let two_pi = 2.0 * std::f64::consts::PI;
    let step = two_pi / SAMPLES as f64;
    let mut prev_psi = -std::f64::consts::PI;
    let mut prev_val = f(prev_psi);
    for i in 1..=SAMPLES {
        let psi = -std::f64::consts::PI + step * i as f64;
        let val = f(psi);
        if prev_val == 0.0 {
            roots.push(prev_psi);
        } else if prev_val.signum() != val.signum() {
            let mut lo = prev_psi;
            let mut hi = psi;
            let mut lo_val = prev_val;
            for _ in 0..60 {
                let mid = 0.5 * (lo + hi);
                let mid_val = f(mid);
                if mid_val == 0.0 || (hi - lo).abs() < 1e-13 {
                    lo = mid;
                    break;
                }
                if mid_val.signum() == lo_val.signum() {
                    lo = mid;
                    lo_val = mid_val;
                } else {
                    hi = mid;
                }
            }
            roots.push(wrap_to_pi(0.5 * (lo + hi)));
        }
        prev_psi = psi;
        prev_val = val;
    }
    roots
}

enum JointFormula {
    Pivot(PivotCoeffs),
    Hinge(HingeCoeffs),
}

/// The psi-parameterized closed-form joint functions for one `(pose, global
/// configuration)` pair (spec §4.2).
pub struct Coefficients {
    per_joint: [JointFormula; NUM_JOINTS],
    gc: GlobalConfiguration,
}

impl Coefficients {
    /// Builds the coefficient set for `pose` under global configuration `gc`.
    ///
    /// Returns an `RLLKinMsg` status (not a hard `Result`-style error) so
    /// callers can distinguish "target unreachable" from "target too close
    /// to a singularity" the way the rest of the engine reports failure.
    pub fn build(
        pose: &Pose,
        gc: GlobalConfiguration,
        geometry: &LinkGeometry,
        fallback_normal: Option<Vector3<f64>>,
    ) -> Result<Self, RLLKinMsg> {
        let shoulder = geometry.shoulder_point();
        let wrist = pose.position - geometry.wrist_to_flange * pose.z_axis();
        let xsw = wrist - shoulder;
        let lsw = xsw.norm();

        if lsw <= 1e-9 {
            return Err(RLLKinMsg::TargetTooCloseToSingularity(
                "shoulder and wrist points coincide".to_string(),
            ));
        }
        if lsw > geometry.max_reach() + 1e-6 || lsw < geometry.min_reach() - 1e-6 {
            return Err(RLLKinMsg::JointLimitViolated(format!(
                "target distance {lsw:.6} outside reachable range [{:.6}, {:.6}]",
                geometry.min_reach(),
                geometry.max_reach()
            )));
        }
        if (lsw - geometry.max_reach()).abs() <= 1e-6 || (lsw - geometry.min_reach()).abs() <= 1e-6 {
            return Err(RLLKinMsg::TargetTooCloseToSingularity(format!(
                "shoulder-elbow-wrist triangle is collinear at distance {lsw:.6} (arm fully stretched or folded back on itself)"
            )));
        }

        let u = xsw / lsw;
        let (n_ref, e_b) = reference_plane(u, fallback_normal).ok_or_else(|| {
            RLLKinMsg::TargetTooCloseToSingularity(
                "shoulder-wrist axis is vertical and no fallback reference normal was supplied".to_string(),
            )
        })?;

        let lse = geometry.upper_arm_length;
        let lew = geometry.forearm_length;

        let theta_su = law_of_cosines_angle(lse, lsw, lew).ok_or_else(|| {
            RLLKinMsg::TargetTooCloseToSingularity("shoulder triangle violates triangle inequality".to_string())
        })?;
        let cos_theta4 = ((lsw * lsw - lse * lse - lew * lew) / (2.0 * lse * lew)).clamp(-1.0, 1.0);
        let theta4 = gc.elbow.value() * cos_theta4.acos();

        // J1 / J2: azimuth and polar angle of the upper-arm direction
        // e_elbow(psi) = cos(theta_su)*u + sin(theta_su)*(cos(psi)*n_ref + sin(psi)*e_b),
        // obtained by rotating the fixed reference upper-arm direction about u.
        let gc_s = gc.shoulder.value();
        let sin_su = theta_su.sin();
        let cos_su = theta_su.cos();

        let j1 = PivotCoeffs {
            a: gc_s * sin_su * e_b.y,
            b: gc_s * sin_su * n_ref.y,
            c: gc_s * cos_su * u.y,
            a2: gc_s * sin_su * e_b.x,
            b2: gc_s * sin_su * n_ref.x,
            c2: gc_s * cos_su * u.x,
        };
        let j2 = HingeCoeffs {
            a: sin_su * e_b.z,
            b: sin_su * n_ref.z,
            c: 0.0,
            d: 0.0,
            e: 0.0,
            f: cos_su * u.z,
            sign: gc_s,
        };

        // J3: azimuth of the elbow bend-plane normal n_plane(psi) = sin(psi)*n_ref
        // - cos(psi)*e_b about the fixed in-plane axes. Global configuration does
        // not affect this joint: the upper-arm direction itself (and hence the
        // bend plane) is independent of the J1/J2 sign choice.
        let j3 = PivotCoeffs { a: 0.0, b: -1.0, c: 0.0, a2: 1.0, b2: 0.0, c2: 0.0 };

        // J4: elbow hinge, independent of psi.
        let j4 = HingeCoeffs { a: 0.0, b: 0.0, c: 0.0, d: 0.0, e: 0.0, f: cos_theta4, sign: gc.elbow.value() };

        // J5/J6/J7: standard ZYZ decomposition of the orientation the spherical
        // wrist sub-chain must contribute, M(psi) = Rz(-theta4) * R03(psi)^T *
        // R_target, where R03(psi) is the (psi=0) shoulder/elbow frame rotated
        // about u by Rodrigues' formula.
        let x3_ref = cos_su * u + sin_su * n_ref;
        let z3_ref = -e_b;
        let y3_ref = z3_ref.cross(&x3_ref);
        let r03 = Matrix3::from_columns(&[x3_ref, y3_ref, z3_ref]);
        let k = skew(u);
        let as3 = k * r03;
        let bs3 = k * as3;
        let cs3 = r03 + bs3;

        let (s4, co4) = theta4.sin_cos();
        let rz_neg_theta4 = Matrix3::new(co4, s4, 0.0, -s4, co4, 0.0, 0.0, 0.0, 1.0);
        let r_target = pose.rotation_matrix();

        let cm = rz_neg_theta4 * cs3.transpose() * r_target;
        let am = rz_neg_theta4 * as3.transpose() * r_target;
        let bm = rz_neg_theta4 * bs3.transpose() * r_target;

        let gc_w = gc.wrist.value();
        let j5 = PivotCoeffs {
            a: gc_w * am[(1, 2)],
            b: -gc_w * bm[(1, 2)],
            c: gc_w * cm[(1, 2)],
            a2: gc_w * am[(0, 2)],
            b2: -gc_w * bm[(0, 2)],
            c2: gc_w * cm[(0, 2)],
        };
        let j6 = HingeCoeffs {
            a: am[(2, 2)],
            b: -bm[(2, 2)],
            c: 0.0,
            d: 0.0,
            e: 0.0,
            f: cm[(2, 2)],
            sign: gc_w,
        };
        let j7 = PivotCoeffs {
            a: gc_w * am[(2, 1)],
            b: -gc_w * bm[(2, 1)],
            c: gc_w * cm[(2, 1)],
            a2: -gc_w * am[(2, 0)],
            b2: gc_w * bm[(2, 0)],
            c2: -gc_w * cm[(2, 0)],
        };

        Ok(Self {
            per_joint: [
                JointFormula::Pivot(j1),
                JointFormula::Hinge(j2),
                JointFormula::Pivot(j3),
                JointFormula::Hinge(j4),
                JointFormula::Pivot(j5),
                JointFormula::Hinge(j6),
                JointFormula::Pivot(j7),
            ],
            gc,
        })
    }

    pub fn global_configuration(&self) -> GlobalConfiguration {
        self.gc
    }

    pub fn pivot(&self, index: usize) -> Option<&PivotCoeffs> {
        match &self.per_joint[index] {
            JointFormula::Pivot(p) => Some(p),
            JointFormula::Hinge(_) => None,
        }
    }

    pub fn hinge(&self, index: usize) -> Option<&HingeCoeffs> {
        match &self.per_joint[index] {
            JointFormula::Hinge(h) => Some(h),
            JointFormula::Pivot(_) => None,
        }
    }

    pub fn joint_angle(&self, index: usize, psi: f64) -> f64 {
        debug_assert_eq!(JOINT_KINDS[index], self.kind(index));
        match &self.per_joint[index] {
            JointFormula::Pivot(p) => p.eval(psi),
            JointFormula::Hinge(h) => h.eval(psi),
        }
    }

    pub fn joint_derivative(&self, index: usize, psi: f64, current_q: f64) -> f64 {
        match &self.per_joint[index] {
            JointFormula::Pivot(p) => p.derivative(psi),
            JointFormula::Hinge(h) => h.derivative(psi, current_q),
        }
    }

    fn kind(&self, index: usize) -> JointKind {
        match &self.per_joint[index] {
            JointFormula::Pivot(_) => JointKind::Pivot,
            JointFormula::Hinge(_) => JointKind::Hinge,
        }
    }

    /// The elbow's fixed angle, independent of psi.
    pub fn elbow_angle(&self) -> f64 {
        self.joint_angle(ELBOW_JOINT, 0.0)
    }

    pub fn pivot_singularity(&self, index: usize) -> Option<f64> {
        self.pivot(index).and_then(PivotCoeffs::singularity)
    }

    /// Up to two arm-angle values where `joint_angle(index, psi) == limit`,
    /// after discarding algebraic roots that do not actually re-evaluate to
    /// `limit` (the atan2-based pivot condition has a spurious `limit + pi`
    /// root that must be filtered this way).
    pub fn arm_angle_for_joint_limit(&self, index: usize, limit: f64) -> Vec<f64> {
        let mut candidates = match &self.per_joint[index] {
            JointFormula::Pivot(p) => {
                let (sl, cl) = limit.sin_cos();
                let a = p.a * cl - p.a2 * sl;
                let b = p.b * cl - p.b2 * sl;
                let constant = p.c * cl - p.c2 * sl;
                solve_sin_cos_equation(a, b, -constant)
            }
            JointFormula::Hinge(h) => {
                let target = limit.cos();
                if h.is_linear() {
                    solve_sin_cos_equation(h.a, h.b, target - h.f)
                } else {
                    solve_hinge_value_equation(h, target)
                }
            }
        };
        candidates.retain(|psi| (self.joint_angle(index, *psi) - limit).abs() <= 10.0 * ZERO_ROUNDING_TOL.sqrt());
        candidates.sort_by(|a, b| a.total_cmp(b));
        candidates.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use std::f64::consts::FRAC_PI_2;

    fn geometry() -> LinkGeometry {
        LinkGeometry { shoulder_height: 0.3, upper_arm_length: 0.4, forearm_length: 0.39, wrist_to_flange: 0.126 }
    }

    fn reach_pose() -> Pose {
        Pose::new(Vector3::new(0.3, 0.2, 0.5), UnitQuaternion::identity())
    }

    #[test]
    fn build_succeeds_for_a_reachable_pose() {
        let geo = geometry();
        let gc = GlobalConfiguration::from_index(0);
        let coeffs = Coefficients::build(&reach_pose(), gc, &geo, None);
        assert!(coeffs.is_ok());
    }

    #[test]
    fn build_rejects_unreachable_pose() {
        let geo = geometry();
        let far = Pose::new(Vector3::new(10.0, 0.0, 0.3), UnitQuaternion::identity());
        let gc = GlobalConfiguration::from_index(0);
        let result = Coefficients::build(&far, gc, &geo, None);
        assert!(matches!(result, Err(RLLKinMsg::JointLimitViolated(_))));
    }

    #[test]
    fn elbow_angle_is_independent_of_psi() {
        let geo = geometry();
        let gc = GlobalConfiguration::from_index(0);
        let coeffs = Coefficients::build(&reach_pose(), gc, &geo, None).unwrap();
        let at_zero = coeffs.joint_angle(ELBOW_JOINT, 0.0);
        let at_half_pi = coeffs.joint_angle(ELBOW_JOINT, FRAC_PI_2);
        assert_relative_eq!(at_zero, at_half_pi, epsilon = 1e-12);
    }

    #[test]
    fn solve_sin_cos_equation_round_trips() {
        let a = 0.7;
        let b = -0.3;
        let c = 0.2;
        let roots = solve_sin_cos_equation(a, b, c);
        assert!(!roots.is_empty());
        for psi in roots {
            let lhs = a * psi.sin() + b * psi.cos();
            assert_relative_eq!(lhs, c, epsilon = 1e-9);
        }
    }

    #[test]
    fn arm_angle_for_joint_limit_round_trips_for_pivot() {
        let geo = geometry();
        let gc = GlobalConfiguration::from_index(0);
        let coeffs = Coefficients::build(&reach_pose(), gc, &geo, None).unwrap();
        let probe_psi = 0.4;
        let limit = coeffs.joint_angle(0, probe_psi);
        let roots = coeffs.arm_angle_for_joint_limit(0, limit);
        assert!(roots.iter().any(|psi| (psi - probe_psi).abs() < 1e-6));
    }

    #[test]
    fn arm_angle_for_joint_limit_round_trips_for_hinge() {
        let geo = geometry();
        let gc = GlobalConfiguration::from_index(0);
        let coeffs = Coefficients::build(&reach_pose(), gc, &geo, None).unwrap();
        let probe_psi = -0.8;
        let limit = coeffs.joint_angle(1, probe_psi);
        let roots = coeffs.arm_angle_for_joint_limit(1, limit);
        assert!(roots.iter().any(|psi| (psi - probe_psi).abs() < 1e-6));
    }
}
