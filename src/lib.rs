//! Analytical inverse kinematics for 7-DOF S-R-S (spherical shoulder,
//! revolute elbow, spherical wrist) redundant serial manipulators.
//!
//! The chain's redundancy is resolved by a scalar arm angle psi, the angle
//! of the shoulder-elbow-wrist bend plane about the shoulder-wrist axis
//! (Shimizu et al.'s "arm angle" parameterization). For a fixed flange pose
//! and a fixed choice of global configuration (shoulder/elbow/wrist sign
//! triple), every joint angle is a closed-form function of psi alone:
//! pivot joints (J1, J3, J5, J7) are `atan2` of linear combinations of
//! `sin(psi)`/`cos(psi)`, hinge joints (J2, J4, J6) are `+/-acos` of a
//! (here always linear) combination of the same.
//!
//! [`KinematicsEngine`] is the entry point: build one from [`LinkGeometry`]
//! and [`JointLimits`], then call [`KinematicsEngine::forward`] for forward
//! kinematics, [`KinematicsEngine::intervals_for`] for the feasible
//! arm-angle set at a pose, [`KinematicsEngine::inverse_arm_angle`] for a
//! single closed-form solve, and [`KinematicsEngine::inverse`] for full
//! redundancy resolution against a [`SeedState`] and [`Options`].

pub mod coefficients;
pub mod forward;
pub mod geometry;
pub mod intervals;
pub mod redundancy;
pub mod solver;
pub mod types;

pub use coefficients::{Coefficients, HingeCoeffs, PivotCoeffs};
pub use forward::{forward, ForwardResult};
pub use geometry::{law_of_cosines_angle, reference_plane, skew};
pub use intervals::{interval_for_arm_angle, ArmAngleInterval, IntervalQuery};
pub use redundancy::{
    max_joint_step, rank_candidates, same_interval_as_seed, scale_arm_angle_step, CandidateSolution,
    MIN_ARM_ANGLE_SCALE,
};
pub use solver::{InverseResult, IntervalsResult, KinematicsEngine, SingleInverseResult};
pub use types::{
    approx_eq, approx_zero, circular_delta, validate_arm_angle, validate_joint_vector, weighted_distance, wrap_to_pi,
    ConfigError, GlobalConfiguration, GlobalConfigurationMode, JointKind, JointLimits, JointVector, LinkGeometry,
    Options, Pose, PositionIkMode, RLLKinMsg, SeedState, Severity, Sign, ELBOW_JOINT, JOINT_KINDS, NUM_JOINTS,
    ZERO_ROUNDING_TOL,
};
