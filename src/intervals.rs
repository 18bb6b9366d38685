//! The arm-angle interval engine: maps joint limits to blocked/feasible
//! psi-intervals on the circle, merges them across joints, and answers
//! "which feasible interval (if any) contains/best matches a given psi".

use std::f64::consts::PI;

use crate::coefficients::Coefficients;
use crate::types::{circular_delta, wrap_to_pi, JointLimits, ZERO_ROUNDING_TOL};

/// An interval on the psi circle. `wraps` is stored explicitly rather than
/// inferred from `hi < lo`, since a degenerate `lo == hi, wraps == true`
/// interval is used to represent "blocks the entire circle".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmAngleInterval {
    pub lo: f64,
    pub hi: f64,
    pub wraps: bool,
}

impl ArmAngleInterval {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi, wraps: lo > hi }
    }

    pub fn full_circle(at: f64) -> Self {
        Self { lo: at, hi: at, wraps: true }
    }

    pub fn contains(&self, psi: f64) -> bool {
        if self.wraps {
            psi >= self.lo || psi <= self.hi
        } else {
            psi >= self.lo && psi <= self.hi
        }
    }

    pub fn width(&self) -> f64 {
        if self.wraps { (self.hi - self.lo) + 2.0 * PI } else { self.hi - self.lo }
    }

    pub fn midpoint(&self) -> f64 {
        wrap_to_pi(self.lo + 0.5 * self.width())
    }
}

fn collect_breakpoints(coeffs: &Coefficients, index: usize, limits: &JointLimits) -> Vec<f64> {
    let mut pts = coeffs.arm_angle_for_joint_limit(index, limits.lower[index]);
    pts.extend(coeffs.arm_angle_for_joint_limit(index, limits.upper[index]));
    if let Some(s) = coeffs.pivot_singularity(index) {
        pts.push(s);
    }
    pts.sort_by(|a, b| a.total_cmp(b));
    pts.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
    pts
}

/// An explicit `[s - 10*ZERO_ROUNDING_TOL, s + 10*ZERO_ROUNDING_TOL]` blocked
/// interval around a pivot-singularity arm angle (spec §4.3 step 5). A
/// singularity is always blocked regardless of whether the joint's own box
/// limits happen to be satisfied at `s` itself — the derivative diverges
/// there, so psi values arbitrarily close to it are not actually reachable.
fn singularity_guard_interval(s: f64) -> ArmAngleInterval {
    let guard = 10.0 * ZERO_ROUNDING_TOL;
    ArmAngleInterval::new(wrap_to_pi(s - guard), wrap_to_pi(s + guard))
}

fn violates(angle: f64, limits: &JointLimits, index: usize) -> bool {
    angle < limits.lower[index] - ZERO_ROUNDING_TOL || angle > limits.upper[index] + ZERO_ROUNDING_TOL
}

/// The psi-intervals in which `joint_angle(index, psi)` would violate
/// `limits` (spec §4.3). The breakpoints come from `arm_angle_for_joint_limit`
/// plus pivot singularities; each arc between consecutive breakpoints is
/// classified by evaluating the joint angle at its midpoint.
pub fn blocked_intervals_for_joint(coeffs: &Coefficients, index: usize, limits: &JointLimits) -> Vec<ArmAngleInterval> {
    let breakpoints = collect_breakpoints(coeffs, index, limits);
    let singularity_guard = coeffs.pivot_singularity(index).map(singularity_guard_interval);

    let mut blocked = if breakpoints.is_empty() {
        let probe = coeffs.joint_angle(index, 0.0);
        if violates(probe, limits, index) { vec![ArmAngleInterval::full_circle(0.0)] } else { Vec::new() }
    } else if breakpoints.len() == 1 {
        let lo = breakpoints[0];
        let probe = coeffs.joint_angle(index, wrap_to_pi(lo + PI));
        if violates(probe, limits, index) { vec![ArmAngleInterval::full_circle(lo)] } else { Vec::new() }
    } else {
        let n = breakpoints.len();
        let mut blocked = Vec::new();
        for i in 0..n {
            let lo = breakpoints[i];
            let hi = breakpoints[(i + 1) % n];
            let arc = ArmAngleInterval::new(lo, hi);
            let probe = coeffs.joint_angle(index, arc.midpoint());
            if violates(probe, limits, index) {
                blocked.push(arc);
            }
        }
        blocked
    };

    // A pivot singularity always blocks a narrow guard band around itself,
    // independent of whatever the limit-violation probe above concluded for
    // the arcs straddling it.
    if let Some(guard) = singularity_guard {
        blocked.push(guard);
    }
    blocked
}

/// Merges blocked intervals from every joint into one non-overlapping,
/// circularly-sorted set. An interval that is fully covered by the interval
/// already accumulated at its start is explicitly skipped rather than
/// relied upon to fall out of sort order, since two intervals can start at
/// different points yet one still fully contain the other.
pub fn merge_blocked_intervals(intervals: Vec<ArmAngleInterval>) -> Vec<ArmAngleInterval> {
    if intervals.is_empty() {
        return intervals;
    }
    if intervals.iter().any(|iv| iv.wraps && (iv.hi - iv.lo).abs() < 1e-9) {
        return vec![ArmAngleInterval::full_circle(intervals[0].lo)];
    }

    let mut pieces: Vec<(f64, f64)> = Vec::new();
    for iv in &intervals {
        if iv.wraps {
            pieces.push((iv.lo, PI));
            pieces.push((-PI, iv.hi));
        } else {
            pieces.push((iv.lo, iv.hi));
        }
    }
    pieces.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::new();
    for (lo, hi) in pieces {
        match merged.last_mut() {
            Some(last) if lo <= last.1 + 1e-9 => {
                if hi <= last.1 + 1e-9 {
                    continue; // fully contained in the accumulated interval; skip
                }
                last.1 = hi;
            }
            _ => merged.push((lo, hi)),
        }
    }

    // Two pieces that respectively touch -pi and pi are one interval that
    // wraps through the seam; re-join them.
    if merged.len() > 1 {
        let first = merged[0];
        let last = *merged.last().unwrap();
        if (first.0 + PI).abs() < 1e-9 && (last.1 - PI).abs() < 1e-9 {
            let wrapped = ArmAngleInterval::new(last.0, first.1);
            merged.remove(0);
            merged.pop();
            let mut result: Vec<ArmAngleInterval> = merged.into_iter().map(|(lo, hi)| ArmAngleInterval::new(lo, hi)).collect();
            result.push(wrapped);
            return result;
        }
    }

    merged.into_iter().map(|(lo, hi)| ArmAngleInterval::new(lo, hi)).collect()
}

/// Complement of a merged blocked-interval set: the feasible psi-intervals.
pub fn feasible_intervals(blocked: &[ArmAngleInterval]) -> Vec<ArmAngleInterval> {
    if blocked.is_empty() {
        return vec![ArmAngleInterval::new(-PI, PI)];
    }
    if blocked.len() == 1 && blocked[0].wraps && (blocked[0].hi - blocked[0].lo).abs() < 1e-9 {
        return Vec::new();
    }

    let mut spans: Vec<(f64, f64)> = blocked.iter().map(|b| (b.lo, b.hi)).collect();
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut feasible = Vec::new();
    for i in 0..spans.len() {
        let (_, end_i) = spans[i];
        let (start_next, _) = spans[(i + 1) % spans.len()];
        if (end_i - start_next).abs() < 1e-9 {
            continue;
        }
        feasible.push(ArmAngleInterval::new(end_i, start_next));
    }
    feasible
}

/// Result of matching a candidate psi against the feasible-interval set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntervalQuery {
    /// psi lies strictly within `feasible[_]`.
    Contained(usize),
    /// psi lies within tolerance of a boundary of `feasible[_]`.
    SnappedToBoundary(usize),
    /// No feasible interval exists at all.
    Empty,
    /// psi is not in any feasible interval; `feasible[_]` is the circularly
    /// nearest one (by distance to its midpoint).
    Fallback(usize),
}

pub fn interval_for_arm_angle(feasible: &[ArmAngleInterval], psi: f64) -> IntervalQuery {
    if feasible.is_empty() {
        return IntervalQuery::Empty;
    }
    for (i, iv) in feasible.iter().enumerate() {
        if iv.contains(psi) {
            return IntervalQuery::Contained(i);
        }
    }
    for (i, iv) in feasible.iter().enumerate() {
        if circular_delta(psi, iv.lo).abs() <= 1e-6 || circular_delta(psi, iv.hi).abs() <= 1e-6 {
            return IntervalQuery::SnappedToBoundary(i);
        }
    }
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, iv) in feasible.iter().enumerate() {
        let dist = circular_delta(psi, iv.midpoint()).abs();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    IntervalQuery::Fallback(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_contains_handles_wrap() {
        let iv = ArmAngleInterval::new(2.5, -2.5);
        assert!(iv.wraps);
        assert!(iv.contains(3.0));
        assert!(iv.contains(-3.0));
        assert!(!iv.contains(0.0));
    }

    #[test]
    fn full_circle_contains_everything() {
        let iv = ArmAngleInterval::full_circle(0.3);
        for psi in [-3.0, -1.0, 0.0, 0.3, 1.5, 3.0] {
            assert!(iv.contains(psi));
        }
    }

    #[test]
    fn merge_skips_fully_contained_interval() {
        let intervals = vec![ArmAngleInterval::new(-1.0, 1.0), ArmAngleInterval::new(-0.5, 0.5)];
        let merged = merge_blocked_intervals(intervals);
        assert_eq!(merged.len(), 1);
        assert!((merged[0].lo + 1.0).abs() < 1e-9);
        assert!((merged[0].hi - 1.0).abs() < 1e-9);
    }

    #[test]
    fn merge_joins_intervals_across_the_seam() {
        let intervals = vec![ArmAngleInterval::new(2.8, -2.8), ArmAngleInterval::new(-2.9, -2.7)];
        let merged = merge_blocked_intervals(intervals);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].wraps);
    }

    #[test]
    fn feasible_is_complement_of_blocked() {
        let blocked = vec![ArmAngleInterval::new(-1.0, 1.0)];
        let feasible = feasible_intervals(&blocked);
        assert_eq!(feasible.len(), 1);
        assert!(feasible[0].wraps);
        assert!(feasible[0].contains(2.0));
        assert!(!feasible[0].contains(0.0));
    }

    #[test]
    fn interval_for_arm_angle_falls_back_to_nearest_when_blocked() {
        let feasible = vec![ArmAngleInterval::new(0.5, 1.0), ArmAngleInterval::new(2.0, 2.5)];
        let result = interval_for_arm_angle(&feasible, 0.2);
        assert_eq!(result, IntervalQuery::Fallback(0));
    }

    #[test]
    fn interval_for_arm_angle_reports_empty_with_no_feasible_intervals() {
        let result = interval_for_arm_angle(&[], 0.0);
        assert_eq!(result, IntervalQuery::Empty);
    }
}
