//! Redundancy resolution: ranking candidate solutions against a seed, the
//! `same_interval_as_seed` indicator, and time-optimal arm-angle step
//! scaling between successive calls.

use crate::coefficients::Coefficients;
use crate::intervals::{interval_for_arm_angle, ArmAngleInterval, IntervalQuery};
use crate::types::{
    approx_zero, circular_delta, weighted_distance, wrap_to_pi, GlobalConfiguration, JointLimits, JointVector,
    Options, RLLKinMsg, ZERO_ROUNDING_TOL, NUM_JOINTS,
};

/// One fully-resolved candidate: a global configuration, an arm angle, the
/// resulting joint vector, and whether it is actually usable.
#[derive(Debug, Clone)]
pub struct CandidateSolution {
    pub global_configuration: GlobalConfiguration,
    pub arm_angle: f64,
    pub joints: Option<JointVector>,
    pub status: RLLKinMsg,
}

impl CandidateSolution {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Per-joint step bound for one control cycle: the tighter of the
/// velocity-limited and acceleration-limited displacement (spec §4.5 —
/// `min(v_max * s_v * dt, 0.5 * a_max * s_a * dt^2)`).
pub fn max_joint_step(limits: &JointLimits, options: &Options) -> JointVector {
    std::array::from_fn(|i| {
        let v = limits.velocity_max[i] * options.joint_velocity_scaling_factor * options.delta_t;
        let a = 0.5
            * limits.acceleration_max[i]
            * options.joint_acceleration_scaling_factor
            * options.delta_t
            * options.delta_t;
        v.min(a)
    })
}

/// Below this scaling factor the requested step is rejected outright rather
/// than accepted as a near-zero-motion "success" (spec §4.5 step 1 — "if
/// alpha drops below a floor, the candidate is rejected").
pub const MIN_ARM_ANGLE_SCALE: f64 = 1e-3;

/// Scales a requested arm-angle step so that no joint's per-cycle
/// displacement (estimated via the closed-form derivative at the current
/// psi) exceeds its time-optimal bound, then returns the resulting psi.
/// The caller re-evaluates joint angles at this psi via the closed form;
/// this function never interpolates joint values directly.
///
/// Returns `None` when the scaling factor needed to honor every joint's
/// bound falls below `MIN_ARM_ANGLE_SCALE` — the step cannot be usefully
/// taken this cycle and the caller must reject the candidate.
pub fn scale_arm_angle_step(
    coeffs: &Coefficients,
    current_psi: f64,
    current_q: &JointVector,
    desired_psi: f64,
    limits: &JointLimits,
    options: &Options,
) -> Option<f64> {
    let raw_delta = circular_delta(current_psi, desired_psi);
    if approx_zero(raw_delta) {
        return Some(current_psi);
    }
    let max_step = max_joint_step(limits, options);
    let mut alpha = 1.0f64;
    for i in 0..NUM_JOINTS {
        let dq = coeffs.joint_derivative(i, current_psi, current_q[i]) * raw_delta;
        if dq.abs() > max_step[i] && dq.abs() > ZERO_ROUNDING_TOL {
            alpha = alpha.min(max_step[i] / dq.abs());
        }
    }
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha < MIN_ARM_ANGLE_SCALE {
        return None;
    }
    Some(wrap_to_pi(current_psi + alpha * raw_delta))
}

/// Whether `seed_psi` and `candidate_psi` fall in the same feasible
/// interval (replaces a jump-threshold heuristic with an explicit
/// membership check — see DESIGN.md).
pub fn same_interval_as_seed(feasible: &[ArmAngleInterval], seed_psi: f64, candidate_psi: f64) -> bool {
    let seed_interval = match interval_for_arm_angle(feasible, seed_psi) {
        IntervalQuery::Contained(i) | IntervalQuery::SnappedToBoundary(i) => Some(i),
        _ => None,
    };
    let candidate_interval = match interval_for_arm_angle(feasible, candidate_psi) {
        IntervalQuery::Contained(i) | IntervalQuery::SnappedToBoundary(i) => Some(i),
        _ => None,
    };
    matches!((seed_interval, candidate_interval), (Some(a), Some(b)) if a == b)
}

/// Orders candidates: successes before failures, then by weighted
/// joint-space distance to the seed's current joints, with a final
/// tie-break preferring the global configuration that matches the seed
/// (used by `KeepCurrent` / `SelectBySeed` modes).
pub fn rank_candidates(candidates: &mut [CandidateSolution], seed_joints: &JointVector, weights: &JointVector, seed_gc: Option<GlobalConfiguration>) {
    candidates.sort_by(|a, b| {
        match (a.is_success(), b.is_success()) {
            (true, false) => return std::cmp::Ordering::Less,
            (false, true) => return std::cmp::Ordering::Greater,
            _ => {}
        }
        let da = a.joints.map(|q| weighted_distance(&q, seed_joints, weights)).unwrap_or(f64::INFINITY);
        let db = b.joints.map(|q| weighted_distance(&q, seed_joints, weights)).unwrap_or(f64::INFINITY);
        match da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Equal => {
                let a_matches = seed_gc == Some(a.global_configuration);
                let b_matches = seed_gc == Some(b.global_configuration);
                b_matches.cmp(&a_matches)
            }
            other => other,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RLLKinMsg;

    fn limits() -> JointLimits {
        JointLimits {
            lower: [-2.9; NUM_JOINTS],
            upper: [2.9; NUM_JOINTS],
            velocity_max: [1.0; NUM_JOINTS],
            acceleration_max: [2.0; NUM_JOINTS],
        }
    }

    #[test]
    fn max_joint_step_picks_the_tighter_bound() {
        let l = limits();
        let options = Options { delta_t: 0.1, ..Options::default() };
        let step = max_joint_step(&l, &options);
        // v*dt = 0.1, 0.5*a*dt^2 = 0.01 -> acceleration bound wins.
        assert!((step[0] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn rank_candidates_prefers_successes_then_closeness() {
        let seed = [0.0; NUM_JOINTS];
        let weights = [1.0; NUM_JOINTS];
        let mut far = [0.0; NUM_JOINTS];
        far[0] = 1.0;
        let mut near = [0.0; NUM_JOINTS];
        near[0] = 0.1;
        let mut candidates = vec![
            CandidateSolution {
                global_configuration: GlobalConfiguration::from_index(0),
                arm_angle: 0.0,
                joints: Some(far),
                status: RLLKinMsg::Success,
            },
            CandidateSolution {
                global_configuration: GlobalConfiguration::from_index(1),
                arm_angle: 0.0,
                joints: None,
                status: RLLKinMsg::NoSolutionForArmAngle("x".into()),
            },
            CandidateSolution {
                global_configuration: GlobalConfiguration::from_index(2),
                arm_angle: 0.0,
                joints: Some(near),
                status: RLLKinMsg::Success,
            },
        ];
        rank_candidates(&mut candidates, &seed, &weights, None);
        assert_eq!(candidates[0].joints, Some(near));
        assert!(!candidates[2].is_success());
    }
}
