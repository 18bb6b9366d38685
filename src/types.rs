//! Core value types shared by every module: joint vectors, limits, seed
//! state, options, poses, and the `RLLKinMsg` status enum.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use std::f64::consts::PI;

/// Equality / sign tolerance used throughout the engine.
pub const ZERO_ROUNDING_TOL: f64 = 1e-9;

/// Number of joints in the S-R-S chain.
pub const NUM_JOINTS: usize = 7;

/// A 7-element joint vector, radians, indexed 0..6 (J1..J7).
pub type JointVector = [f64; NUM_JOINTS];

/// Wrap an angle into `[-pi, pi]`.
pub fn wrap_to_pi(angle: f64) -> f64 {
    let two_pi = 2.0 * PI;
    let wrapped = (angle + PI).rem_euclid(two_pi) - PI;
    if wrapped <= -PI { wrapped + two_pi } else { wrapped }
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= ZERO_ROUNDING_TOL
}

pub fn approx_zero(a: f64) -> bool {
    a.abs() <= ZERO_ROUNDING_TOL
}

/// Shortest signed distance from `from` to `to` going around the circle.
pub fn circular_delta(from: f64, to: f64) -> f64 {
    wrap_to_pi(to - from)
}

/// Sign of a global-configuration flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn value(self) -> f64 {
        match self {
            Sign::Positive => 1.0,
            Sign::Negative => -1.0,
        }
    }

    pub fn of(x: f64) -> Self {
        if x >= 0.0 { Sign::Positive } else { Sign::Negative }
    }

    fn from_bit(bit: u8) -> Self {
        if bit == 0 { Sign::Positive } else { Sign::Negative }
    }

    fn to_bit(self) -> u8 {
        match self {
            Sign::Positive => 0,
            Sign::Negative => 1,
        }
    }
}

/// The discrete global configuration: shoulder/elbow/wrist sign triple,
/// packed into an integer 0..7 (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalConfiguration {
    pub shoulder: Sign,
    pub elbow: Sign,
    pub wrist: Sign,
}

impl GlobalConfiguration {
    pub fn from_index(index: u8) -> Self {
        assert!(index < 8, "global configuration index must be 0..7, got {index}");
        Self {
            shoulder: Sign::from_bit(index & 0b001),
            elbow: Sign::from_bit((index >> 1) & 0b001),
            wrist: Sign::from_bit((index >> 2) & 0b001),
        }
    }

    pub fn to_index(self) -> u8 {
        self.shoulder.to_bit() | (self.elbow.to_bit() << 1) | (self.wrist.to_bit() << 2)
    }

    /// All eight global configurations, in index order.
    pub fn all() -> [GlobalConfiguration; 8] {
        std::array::from_fn(|i| GlobalConfiguration::from_index(i as u8))
    }
}

/// Classification of a joint's algebraic dependence on the arm angle (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointKind {
    Pivot,
    Hinge,
}

/// J1..J7 classification by index 0..6.
pub const JOINT_KINDS: [JointKind; NUM_JOINTS] = [
    JointKind::Pivot, // J1
    JointKind::Hinge, // J2
    JointKind::Pivot, // J3
    JointKind::Hinge, // J4 (elbow, value constant in psi)
    JointKind::Pivot, // J5
    JointKind::Hinge, // J6
    JointKind::Pivot, // J7
];

/// Index of the elbow joint (J4), whose value is psi-independent.
pub const ELBOW_JOINT: usize = 3;

/// End-effector / target pose: position in metres, orientation as a unit
/// quaternion (nalgebra's native `[x, y, z, w]`, i.e. scalar-last) layout.
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Pose {
    pub fn new(position: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self { position, orientation }
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.orientation.to_rotation_matrix().into_inner()
    }

    /// Direction of the local +z axis (flange axis) expressed in the base frame.
    pub fn z_axis(&self) -> Vector3<f64> {
        self.rotation_matrix().column(2).into_owned()
    }
}

/// Per-joint box limits and velocity/acceleration bounds (spec §6 `setJointLimits`).
#[derive(Debug, Clone, Copy)]
pub struct JointLimits {
    pub lower: JointVector,
    pub upper: JointVector,
    pub velocity_max: JointVector,
    pub acceleration_max: JointVector,
}

impl JointLimits {
    pub fn within(&self, q: &JointVector, tol: f64) -> bool {
        (0..NUM_JOINTS).all(|i| q[i] >= self.lower[i] - tol && q[i] <= self.upper[i] + tol)
    }
}

/// Fixed link geometry for the S-R-S chain.
#[derive(Debug, Clone, Copy)]
pub struct LinkGeometry {
    /// Height of the shoulder point (joint-2/3 intersection) above the base origin.
    pub shoulder_height: f64,
    /// Distance from shoulder to elbow.
    pub upper_arm_length: f64,
    /// Distance from elbow to wrist.
    pub forearm_length: f64,
    /// Distance from wrist (joint-5/6 intersection) to the flange.
    pub wrist_to_flange: f64,
}

impl LinkGeometry {
    pub fn shoulder_point(&self) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, self.shoulder_height)
    }

    pub fn max_reach(&self) -> f64 {
        self.upper_arm_length + self.forearm_length
    }

    pub fn min_reach(&self) -> f64 {
        (self.upper_arm_length - self.forearm_length).abs()
    }
}

/// Construction-time validation failures for `LinkGeometry` / `JointLimits`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("joint {index} lower limit {lower} is not below upper limit {upper}")]
    InvalidJointRange { index: usize, lower: f64, upper: f64 },
    #[error("joint {index} velocity limit must be positive, got {value}")]
    NonPositiveVelocityLimit { index: usize, value: f64 },
    #[error("joint {index} acceleration limit must be positive, got {value}")]
    NonPositiveAccelerationLimit { index: usize, value: f64 },
    #[error("link length {name} must be positive, got {value}")]
    NonPositiveLinkLength { name: &'static str, value: f64 },
}

impl JointLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for i in 0..NUM_JOINTS {
            if !(self.lower[i] < self.upper[i]) {
                return Err(ConfigError::InvalidJointRange {
                    index: i,
                    lower: self.lower[i],
                    upper: self.upper[i],
                });
            }
            if !(self.velocity_max[i] > 0.0) {
                return Err(ConfigError::NonPositiveVelocityLimit { index: i, value: self.velocity_max[i] });
            }
            if !(self.acceleration_max[i] > 0.0) {
                return Err(ConfigError::NonPositiveAccelerationLimit { index: i, value: self.acceleration_max[i] });
            }
        }
        Ok(())
    }
}

impl LinkGeometry {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("upper_arm_length", self.upper_arm_length),
            ("forearm_length", self.forearm_length),
            ("wrist_to_flange", self.wrist_to_flange),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::NonPositiveLinkLength { name, value });
            }
        }
        Ok(())
    }
}

/// Severity of a `RLLKinMsg` status (spec §9: "model as a tagged enum with a severity flag").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Warning,
    Error,
}

/// Status returned by every per-call operation (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub enum RLLKinMsg {
    Success,
    TargetTooCloseToSingularity(String),
    JointLimitViolated(String),
    NoSolutionForArmAngle(String),
    ArmAngleNotInSameInterval(String),
    GeneralError(String),
}

impl RLLKinMsg {
    pub fn severity(&self) -> Severity {
        match self {
            RLLKinMsg::Success => Severity::Ok,
            RLLKinMsg::ArmAngleNotInSameInterval(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RLLKinMsg::Success)
    }

    pub fn message(&self) -> &str {
        match self {
            RLLKinMsg::Success => "success",
            RLLKinMsg::TargetTooCloseToSingularity(m)
            | RLLKinMsg::JointLimitViolated(m)
            | RLLKinMsg::NoSolutionForArmAngle(m)
            | RLLKinMsg::ArmAngleNotInSameInterval(m)
            | RLLKinMsg::GeneralError(m) => m,
        }
    }
}

impl std::fmt::Display for RLLKinMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.severity(), self.message())
    }
}

/// Seed joint history: current measured joints, optionally preceded by the
/// previous commanded joints (spec §3).
#[derive(Debug, Clone)]
pub struct SeedState {
    entries: Vec<JointVector>,
}

impl SeedState {
    pub fn current(current: JointVector) -> Self {
        Self { entries: vec![current] }
    }

    pub fn with_previous(previous_commanded: JointVector, current: JointVector) -> Self {
        Self { entries: vec![previous_commanded, current] }
    }

    pub fn current_joints(&self) -> &JointVector {
        self.entries.last().expect("seed state is never empty")
    }

    pub fn previous_joints(&self) -> Option<&JointVector> {
        if self.entries.len() == 2 { Some(&self.entries[0]) } else { None }
    }
}

/// How `global_configuration_mode` resolves candidate GCs (spec §3 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalConfigurationMode {
    ReturnAll,
    KeepCurrent,
    SelectBySeed,
    UserSpecified,
}

/// How the arm angle is chosen for a given pose (spec §3 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionIkMode {
    ExactPsi,
    ClosestFeasiblePsi,
    ResolvePsi,
}

/// Per-call options (spec §3 table, reproduced field-for-field).
#[derive(Debug, Clone)]
pub struct Options {
    pub global_configuration_mode: GlobalConfigurationMode,
    pub user_gc: u8,
    pub position_ik_mode: PositionIkMode,
    pub target_arm_angle: f64,
    pub joint_velocity_scaling_factor: f64,
    pub joint_acceleration_scaling_factor: f64,
    pub delta_t: f64,
    pub joint_distance_weights: JointVector,
    /// Fallback reference-plane normal used when shoulder/wrist/base are collinear.
    pub fallback_reference_normal: Option<Vector3<f64>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            global_configuration_mode: GlobalConfigurationMode::ReturnAll,
            user_gc: 0,
            position_ik_mode: PositionIkMode::ResolvePsi,
            target_arm_angle: 0.0,
            joint_velocity_scaling_factor: 1.0,
            joint_acceleration_scaling_factor: 1.0,
            delta_t: 0.01,
            joint_distance_weights: [1.0; NUM_JOINTS],
            fallback_reference_normal: None,
        }
    }
}

/// Weighted joint-space distance metric used for seed matching (spec §4.5).
pub fn weighted_distance(a: &JointVector, b: &JointVector, weights: &JointVector) -> f64 {
    (0..NUM_JOINTS).map(|i| weights[i] * (a[i] - b[i]).powi(2)).sum()
}

/// Validates a joint vector contains only finite values (spec §7 "Invalid
/// input: NaN..." — surfaced as `GENERAL_ERROR`, never a panic).
pub fn validate_joint_vector(q: &JointVector) -> Result<(), RLLKinMsg> {
    if q.iter().any(|v| !v.is_finite()) {
        return Err(RLLKinMsg::GeneralError("joint vector contains a NaN or infinite component".to_string()));
    }
    Ok(())
}

/// Validates that `psi` is a finite value on `[-pi, pi]` (spec §3 "arm angle
/// psi in [-pi, pi]").
pub fn validate_arm_angle(psi: f64) -> Result<(), RLLKinMsg> {
    if !psi.is_finite() || psi < -PI - ZERO_ROUNDING_TOL || psi > PI + ZERO_ROUNDING_TOL {
        return Err(RLLKinMsg::GeneralError(format!("arm angle {psi} is out of range [-pi, pi]")));
    }
    Ok(())
}

impl Pose {
    /// Validates that every component is finite and that the orientation is,
    /// within tolerance, a unit quaternion (spec §7 "Invalid input: NaN,
    /// non-unit quaternion...").
    pub fn validate(&self) -> Result<(), RLLKinMsg> {
        if !self.position.iter().all(|v| v.is_finite()) {
            return Err(RLLKinMsg::GeneralError("pose position contains a NaN or infinite component".to_string()));
        }
        let quaternion = self.orientation.quaternion();
        if !quaternion.coords.iter().all(|v| v.is_finite()) {
            return Err(RLLKinMsg::GeneralError("pose orientation contains a NaN or infinite component".to_string()));
        }
        let norm = quaternion.norm();
        if (norm - 1.0).abs() > 1e-3 {
            return Err(RLLKinMsg::GeneralError(format!("pose orientation is not a unit quaternion (norm {norm:.6})")));
        }
        Ok(())
    }
}

impl Options {
    /// Validates the fields spec §3's options table constrains: the scaling
    /// factors must lie in `(0, 1]`, `delta_t` must be positive, `user_gc`
    /// must be in `0..7` when it is actually selected, the joint-distance
    /// weights must be positive, and `target_arm_angle` must be a valid arm
    /// angle whenever a mode consults it (spec §7 "Invalid input: ...
    /// inconsistent option combinations").
    pub fn validate(&self) -> Result<(), RLLKinMsg> {
        if self.global_configuration_mode == GlobalConfigurationMode::UserSpecified && self.user_gc > 7 {
            return Err(RLLKinMsg::GeneralError(format!("user_gc {} is out of range 0..7", self.user_gc)));
        }
        if !(self.joint_velocity_scaling_factor > 0.0 && self.joint_velocity_scaling_factor <= 1.0) {
            return Err(RLLKinMsg::GeneralError("joint_velocity_scaling_factor must be in (0, 1]".to_string()));
        }
        if !(self.joint_acceleration_scaling_factor > 0.0 && self.joint_acceleration_scaling_factor <= 1.0) {
            return Err(RLLKinMsg::GeneralError("joint_acceleration_scaling_factor must be in (0, 1]".to_string()));
        }
        if !(self.delta_t > 0.0) {
            return Err(RLLKinMsg::GeneralError("delta_t must be positive".to_string()));
        }
        if self.joint_distance_weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(RLLKinMsg::GeneralError("joint_distance_weights must all be positive".to_string()));
        }
        if matches!(self.position_ik_mode, PositionIkMode::ExactPsi | PositionIkMode::ClosestFeasiblePsi) {
            validate_arm_angle(self.target_arm_angle)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wrap_to_pi_stays_in_range() {
        assert_relative_eq!(wrap_to_pi(0.0), 0.0);
        assert_relative_eq!(wrap_to_pi(PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_to_pi(-PI), -PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_to_pi(3.0 * PI), PI, epsilon = 1e-9);
        assert_relative_eq!(wrap_to_pi(-3.0 * PI), -PI, epsilon = 1e-9);
        assert_relative_eq!(wrap_to_pi(2.0 * PI + 0.1), 0.1, epsilon = 1e-9);
    }

    #[test]
    fn global_configuration_round_trips_through_index() {
        for gc in GlobalConfiguration::all() {
            assert_eq!(GlobalConfiguration::from_index(gc.to_index()), gc);
        }
    }

    #[test]
    fn global_configuration_all_covers_0_to_7() {
        let mut indices: Vec<u8> = GlobalConfiguration::all().iter().map(|gc| gc.to_index()).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0u8..8).collect::<Vec<_>>());
    }

    #[test]
    fn seed_state_exposes_current_and_previous() {
        let current = [1.0; NUM_JOINTS];
        let previous = [0.0; NUM_JOINTS];
        let seed = SeedState::with_previous(previous, current);
        assert_eq!(*seed.current_joints(), current);
        assert_eq!(seed.previous_joints(), Some(&previous));

        let seed2 = SeedState::current(current);
        assert_eq!(seed2.previous_joints(), None);
    }

    #[test]
    fn weighted_distance_is_zero_for_identical_vectors() {
        let q = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7];
        assert_relative_eq!(weighted_distance(&q, &q, &[1.0; NUM_JOINTS]), 0.0);
    }

    #[test]
    fn joint_limits_validate_rejects_inverted_range() {
        let mut limits = JointLimits {
            lower: [-1.0; NUM_JOINTS],
            upper: [1.0; NUM_JOINTS],
            velocity_max: [1.0; NUM_JOINTS],
            acceleration_max: [1.0; NUM_JOINTS],
        };
        assert!(limits.validate().is_ok());
        limits.lower[2] = 2.0;
        assert!(limits.validate().is_err());
    }
}
