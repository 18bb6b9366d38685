//! `KinematicsEngine`: the public entry point composing forward kinematics,
//! the coefficient builder, the interval engine, and redundancy resolution
//! into the operations described in spec §4.4 / §6.

use log::{debug, warn};
use nalgebra::Vector3;

use crate::coefficients::Coefficients;
use crate::forward::{self, ForwardResult};
use crate::intervals::{self, ArmAngleInterval, IntervalQuery};
use crate::redundancy::{self, CandidateSolution};
use crate::types::{
    circular_delta, validate_arm_angle, validate_joint_vector, ConfigError, GlobalConfiguration,
    GlobalConfigurationMode, JointKind, JointLimits, JointVector, LinkGeometry, Options, Pose, PositionIkMode,
    RLLKinMsg, SeedState, JOINT_KINDS, NUM_JOINTS,
};

/// Feasible/blocked psi-intervals for one `(pose, global configuration)` pair.
#[derive(Debug, Clone)]
pub struct IntervalsResult {
    pub blocked: Vec<ArmAngleInterval>,
    pub feasible: Vec<ArmAngleInterval>,
    pub status: RLLKinMsg,
}

/// Result of solving a single `(pose, global configuration, arm angle)` triple.
#[derive(Debug, Clone)]
pub struct SingleInverseResult {
    pub joints: Option<JointVector>,
    pub status: RLLKinMsg,
}

/// Result of a full `inverse()` call: every candidate the requested
/// `global_configuration_mode` produced, ranked best-first.
#[derive(Debug, Clone)]
pub struct InverseResult {
    pub candidates: Vec<CandidateSolution>,
    pub status: RLLKinMsg,
}

impl InverseResult {
    pub fn best(&self) -> Option<&CandidateSolution> {
        self.candidates.first()
    }
}

/// The analytic inverse-kinematics engine for a 7-DOF S-R-S manipulator.
pub struct KinematicsEngine {
    geometry: LinkGeometry,
    limits: JointLimits,
}

impl KinematicsEngine {
    pub fn new(geometry: LinkGeometry, limits: JointLimits) -> Result<Self, ConfigError> {
        geometry.validate()?;
        limits.validate()?;
        Ok(Self { geometry, limits })
    }

    pub fn geometry(&self) -> &LinkGeometry {
        &self.geometry
    }

    pub fn limits(&self) -> &JointLimits {
        &self.limits
    }

    pub fn forward(&self, q: &JointVector) -> ForwardResult {
        forward::forward(&self.geometry, q, None)
    }

    /// Blocked/feasible arm-angle intervals for `pose` under `gc` (spec §6 `intervalsFor`).
    pub fn intervals_for(&self, pose: &Pose, gc: GlobalConfiguration, fallback_normal: Option<Vector3<f64>>) -> IntervalsResult {
        if let Err(status) = pose.validate() {
            return IntervalsResult { blocked: Vec::new(), feasible: Vec::new(), status };
        }
        let coeffs = match Coefficients::build(pose, gc, &self.geometry, fallback_normal) {
            Ok(c) => c,
            Err(status) => return IntervalsResult { blocked: Vec::new(), feasible: Vec::new(), status },
        };
        let mut blocked_all = Vec::new();
        for idx in 0..NUM_JOINTS {
            blocked_all.extend(intervals::blocked_intervals_for_joint(&coeffs, idx, &self.limits));
        }
        let blocked = intervals::merge_blocked_intervals(blocked_all);
        let feasible = intervals::feasible_intervals(&blocked);
        IntervalsResult { blocked, feasible, status: RLLKinMsg::Success }
    }

    /// Solves the single joint vector realizing `pose` at arm angle `psi`,
    /// under the global configuration `options` resolves from `seed` (spec
    /// §6 `inverseArmAngle`): the seed's own GC (via `forward`), unless
    /// `options.global_configuration_mode` is `UserSpecified`.
    pub fn inverse_arm_angle(&self, pose: &Pose, seed: &SeedState, psi: f64, options: &Options) -> SingleInverseResult {
        if let Err(status) = pose.validate().and_then(|_| options.validate()).and_then(|_| validate_arm_angle(psi)) {
            return SingleInverseResult { joints: None, status };
        }
        let fallback = options.fallback_reference_normal;
        let gc = match options.global_configuration_mode {
            GlobalConfigurationMode::UserSpecified => GlobalConfiguration::from_index(options.user_gc),
            _ => forward::forward(&self.geometry, seed.current_joints(), fallback).global_configuration,
        };
        let coeffs = match Coefficients::build(pose, gc, &self.geometry, fallback) {
            Ok(c) => c,
            Err(status) => return SingleInverseResult { joints: None, status },
        };
        self.solve_at_psi(&coeffs, psi)
    }

    fn solve_at_psi(&self, coeffs: &Coefficients, psi: f64) -> SingleInverseResult {
        for i in 0..NUM_JOINTS {
            if JOINT_KINDS[i] == JointKind::Pivot {
                if let Some(singular_psi) = coeffs.pivot_singularity(i) {
                    if circular_delta(psi, singular_psi).abs() < 1e-6 {
                        return SingleInverseResult {
                            joints: None,
                            status: RLLKinMsg::TargetTooCloseToSingularity(format!(
                                "joint {} is undefined at arm angle {psi:.6}",
                                i + 1
                            )),
                        };
                    }
                }
            }
        }
        let q: JointVector = std::array::from_fn(|i| coeffs.joint_angle(i, psi));
        if !self.limits.within(&q, 1e-9) {
            return SingleInverseResult {
                joints: Some(q),
                status: RLLKinMsg::JointLimitViolated(format!("joint limit violated at arm angle {psi:.6}")),
            };
        }
        SingleInverseResult { joints: Some(q), status: RLLKinMsg::Success }
    }

    fn candidate_gc_list(&self, options: &Options, seed_gc: GlobalConfiguration) -> Vec<GlobalConfiguration> {
        match options.global_configuration_mode {
            GlobalConfigurationMode::ReturnAll | GlobalConfigurationMode::SelectBySeed => GlobalConfiguration::all().to_vec(),
            GlobalConfigurationMode::KeepCurrent => vec![seed_gc],
            GlobalConfigurationMode::UserSpecified => vec![GlobalConfiguration::from_index(options.user_gc)],
        }
    }

    /// Picks psi for one candidate GC according to `options.position_ik_mode`.
    fn resolve_psi(&self, feasible: &[ArmAngleInterval], reference_psi: f64, options: &Options) -> Option<f64> {
        match options.position_ik_mode {
            PositionIkMode::ExactPsi => Some(options.target_arm_angle),
            PositionIkMode::ClosestFeasiblePsi | PositionIkMode::ResolvePsi => {
                let target = if options.position_ik_mode == PositionIkMode::ResolvePsi {
                    reference_psi
                } else {
                    options.target_arm_angle
                };
                match intervals::interval_for_arm_angle(feasible, target) {
                    IntervalQuery::Contained(_) | IntervalQuery::SnappedToBoundary(_) => Some(target),
                    IntervalQuery::Fallback(i) => Some(nearest_point_in_interval(&feasible[i], target)),
                    IntervalQuery::Empty => None,
                }
            }
        }
    }

    /// Enumerates global configurations, resolves an arm angle for each,
    /// and ranks the resulting candidates against `seed` (spec §4.4 / §4.5).
    pub fn inverse(&self, pose: &Pose, seed: &SeedState, options: &Options) -> InverseResult {
        if let Err(status) = pose.validate().and_then(|_| options.validate()) {
            return InverseResult { candidates: Vec::new(), status };
        }
        let fallback = options.fallback_reference_normal;
        let seed_forward = forward::forward(&self.geometry, seed.current_joints(), fallback);
        let seed_gc = seed_forward.global_configuration;
        let seed_psi = seed_forward.arm_angle;

        let gc_list = self.candidate_gc_list(options, seed_gc);
        let mut candidates = Vec::with_capacity(gc_list.len());
        let mut build_failure: Option<RLLKinMsg> = None;

        for gc in gc_list {
            let coeffs = match Coefficients::build(pose, gc, &self.geometry, fallback) {
                Ok(c) => c,
                Err(status) => {
                    debug!("coefficient build failed for gc {:?}: {status}", gc.to_index());
                    build_failure.get_or_insert_with(|| status.clone());
                    continue;
                }
            };
            let feasible = {
                let mut blocked_all = Vec::new();
                for idx in 0..NUM_JOINTS {
                    blocked_all.extend(intervals::blocked_intervals_for_joint(&coeffs, idx, &self.limits));
                }
                intervals::feasible_intervals(&intervals::merge_blocked_intervals(blocked_all))
            };

            let psi = match self.resolve_psi(&feasible, seed_psi, options) {
                Some(psi) => psi,
                None => {
                    candidates.push(CandidateSolution {
                        global_configuration: gc,
                        arm_angle: seed_psi,
                        joints: None,
                        status: RLLKinMsg::NoSolutionForArmAngle(
                            "no feasible arm-angle interval for this global configuration".to_string(),
                        ),
                    });
                    continue;
                }
            };

            // Only rate-limit the step when there is a previous commanded
            // vector to measure a time-optimal bound against; a bare
            // current-joints seed has no "previous cycle" to scale from.
            let scaled_psi = if seed.previous_joints().is_some() {
                match redundancy::scale_arm_angle_step(&coeffs, seed_psi, seed.current_joints(), psi, &self.limits, options) {
                    Some(scaled) => scaled,
                    None => {
                        candidates.push(CandidateSolution {
                            global_configuration: gc,
                            arm_angle: seed_psi,
                            joints: None,
                            status: RLLKinMsg::GeneralError(
                                "requested arm-angle step exceeds velocity/acceleration bounds for this cycle".to_string(),
                            ),
                        });
                        continue;
                    }
                }
            } else {
                psi
            };

            let solved = self.solve_at_psi(&coeffs, scaled_psi);
            let mut status = solved.status.clone();

            if status.is_success() && !redundancy::same_interval_as_seed(&feasible, seed_psi, scaled_psi) {
                warn!("arm angle moved to a different feasible interval than the seed");
                status = RLLKinMsg::ArmAngleNotInSameInterval(
                    "resolved arm angle lies in a different feasible interval than the seed".to_string(),
                );
            }

            candidates.push(CandidateSolution {
                global_configuration: gc,
                arm_angle: scaled_psi,
                joints: solved.joints,
                status,
            });
        }

        if candidates.is_empty() {
            return InverseResult {
                candidates: Vec::new(),
                status: build_failure.unwrap_or_else(|| RLLKinMsg::GeneralError("no candidates produced".to_string())),
            };
        }

        let weights = options.joint_distance_weights;
        let seed_gc_for_tiebreak = matches!(
            options.global_configuration_mode,
            GlobalConfigurationMode::KeepCurrent | GlobalConfigurationMode::SelectBySeed
        )
        .then_some(seed_gc);
        redundancy::rank_candidates(&mut candidates, seed.current_joints(), &weights, seed_gc_for_tiebreak);

        let status = if candidates.first().map(CandidateSolution::is_success).unwrap_or(false) {
            RLLKinMsg::Success
        } else {
            candidates[0].status.clone()
        };

        match options.global_configuration_mode {
            GlobalConfigurationMode::ReturnAll => InverseResult { candidates, status },
            _ => InverseResult { candidates: candidates.into_iter().take(1).collect(), status },
        }
    }
}

fn nearest_point_in_interval(interval: &ArmAngleInterval, target: f64) -> f64 {
    if interval.contains(target) {
        return target;
    }
    let to_lo = circular_delta(target, interval.lo).abs();
    let to_hi = circular_delta(target, interval.hi).abs();
    if to_lo <= to_hi { interval.lo } else { interval.hi }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    fn engine() -> KinematicsEngine {
        let geometry = LinkGeometry { shoulder_height: 0.3, upper_arm_length: 0.4, forearm_length: 0.39, wrist_to_flange: 0.126 };
        let limits = JointLimits {
            lower: [-2.9; NUM_JOINTS],
            upper: [2.9; NUM_JOINTS],
            velocity_max: [2.0; NUM_JOINTS],
            acceleration_max: [5.0; NUM_JOINTS],
        };
        KinematicsEngine::new(geometry, limits).unwrap()
    }

    #[test]
    fn forward_then_inverse_arm_angle_recovers_a_consistent_pose() {
        let engine = engine();
        let q = [0.1, 0.6, -0.2, -1.1, 0.3, 0.8, -0.1];
        let fk = engine.forward(&q);
        assert!(fk.status.is_success());

        let seed = SeedState::current(q);
        let options = Options { global_configuration_mode: GlobalConfigurationMode::KeepCurrent, ..Options::default() };
        let result = engine.inverse_arm_angle(&fk.pose, &seed, fk.arm_angle, &options);
        assert!(result.joints.is_some());
    }

    #[test]
    fn intervals_for_returns_feasible_set_for_reachable_pose() {
        let engine = engine();
        let pose = Pose::new(nalgebra::Vector3::new(0.3, 0.2, 0.5), UnitQuaternion::identity());
        let result = engine.intervals_for(&pose, GlobalConfiguration::from_index(0), None);
        assert!(result.status.is_success());
    }

    #[test]
    fn inverse_return_all_produces_eight_candidates() {
        let engine = engine();
        let pose = Pose::new(nalgebra::Vector3::new(0.3, 0.2, 0.5), UnitQuaternion::identity());
        let seed = SeedState::current([0.0; NUM_JOINTS]);
        let options = Options { global_configuration_mode: GlobalConfigurationMode::ReturnAll, ..Options::default() };
        let result = engine.inverse(&pose, &seed, &options);
        assert_eq!(result.candidates.len(), 8);
    }

    #[test]
    fn inverse_user_specified_returns_one_candidate() {
        let engine = engine();
        let pose = Pose::new(nalgebra::Vector3::new(0.3, 0.2, 0.5), UnitQuaternion::identity());
        let seed = SeedState::current([0.0; NUM_JOINTS]);
        let options = Options {
            global_configuration_mode: GlobalConfigurationMode::UserSpecified,
            user_gc: 3,
            ..Options::default()
        };
        let result = engine.inverse(&pose, &seed, &options);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].global_configuration, GlobalConfiguration::from_index(3));
    }
}
