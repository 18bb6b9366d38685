//! Forward kinematics: explicit joint-vector chain, plus the inverse
//! mapping from a forward solution back to `(arm angle, global configuration)`
//! that the redundancy-resolution layer uses to characterize a seed.

use nalgebra::{UnitQuaternion, Vector3};

use crate::geometry::reference_plane;
use crate::types::{validate_joint_vector, GlobalConfiguration, JointVector, LinkGeometry, Pose, RLLKinMsg, Sign, NUM_JOINTS};

/// Result of a forward-kinematics evaluation (spec §4.1).
#[derive(Debug, Clone)]
pub struct ForwardResult {
    pub pose: Pose,
    pub arm_angle: f64,
    pub global_configuration: GlobalConfiguration,
    pub status: RLLKinMsg,
}

/// Standard S-R-S joint axis alternation: J1,J3,J5,J7 twist about the local
/// z-axis, J2,J4,J6 bend about the local y-axis.
fn link_transform(geometry: &LinkGeometry, q: &JointVector) -> [nalgebra::Isometry3<f64>; NUM_JOINTS + 1] {
    use nalgebra::{Isometry3, Translation3};

    let rz = |angle: f64| UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle);
    let ry = |angle: f64| UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angle);
    let tz = |d: f64| Translation3::new(0.0, 0.0, d);

    let mut frames = [Isometry3::identity(); NUM_JOINTS + 1];
    let mut t = Isometry3::identity();

    t *= Isometry3::from_parts(Translation3::identity(), rz(q[0]));
    frames[0] = t;
    t *= tz(geometry.shoulder_height);
    t *= Isometry3::from_parts(Translation3::identity(), ry(q[1]));
    frames[1] = t;
    t *= Isometry3::from_parts(Translation3::identity(), rz(q[2]));
    frames[2] = t;
    t *= tz(geometry.upper_arm_length);
    t *= Isometry3::from_parts(Translation3::identity(), ry(q[3]));
    frames[3] = t;
    t *= Isometry3::from_parts(Translation3::identity(), rz(q[4]));
    frames[4] = t;
    t *= tz(geometry.forearm_length);
    t *= Isometry3::from_parts(Translation3::identity(), ry(q[5]));
    frames[5] = t;
    t *= Isometry3::from_parts(Translation3::identity(), rz(q[6]));
    frames[6] = t;
    t *= tz(geometry.wrist_to_flange);
    frames[7] = t;

    frames
}

/// Evaluates the flange pose for a joint vector, plus the arm angle and
/// global configuration that the seven joint values happen to realize.
pub fn forward(geometry: &LinkGeometry, q: &JointVector, fallback_normal: Option<Vector3<f64>>) -> ForwardResult {
    if let Err(status) = validate_joint_vector(q) {
        return ForwardResult {
            pose: Pose::new(Vector3::zeros(), UnitQuaternion::identity()),
            arm_angle: 0.0,
            global_configuration: GlobalConfiguration::from_index(0),
            status,
        };
    }
    let frames = link_transform(geometry, q);

    let shoulder_point = frames[1].translation.vector;
    let elbow_point = frames[3].translation.vector;
    let wrist_point = frames[5].translation.vector;
    let flange = frames[7];

    let pose = Pose::new(flange.translation.vector, flange.rotation);

    let xsw = wrist_point - shoulder_point;
    let lsw = xsw.norm();
    if lsw <= 1e-9 {
        return ForwardResult {
            pose,
            arm_angle: 0.0,
            global_configuration: GlobalConfiguration::from_index(0),
            status: RLLKinMsg::TargetTooCloseToSingularity("shoulder and wrist points coincide".to_string()),
        };
    }
    let u = xsw / lsw;

    let (n_ref, e_b) = match reference_plane(u, fallback_normal) {
        Some(basis) => basis,
        None => {
            return ForwardResult {
                pose,
                arm_angle: 0.0,
                global_configuration: GlobalConfiguration::from_index(0),
                status: RLLKinMsg::TargetTooCloseToSingularity(
                    "shoulder-wrist axis is vertical and no fallback reference normal was supplied".to_string(),
                ),
            };
        }
    };

    let e_elbow = elbow_point - shoulder_point;
    let perp = e_elbow - u * e_elbow.dot(&u);
    let arm_angle = perp.dot(&e_b).atan2(perp.dot(&n_ref));

    let global_configuration = GlobalConfiguration {
        shoulder: Sign::of(q[1]),
        elbow: Sign::of(q[3]),
        wrist: Sign::of(q[5]),
    };

    ForwardResult { pose, arm_angle, global_configuration, status: RLLKinMsg::Success }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> LinkGeometry {
        LinkGeometry { shoulder_height: 0.3, upper_arm_length: 0.4, forearm_length: 0.39, wrist_to_flange: 0.126 }
    }

    #[test]
    fn forward_of_zero_configuration_succeeds() {
        let geo = geometry();
        let q = [0.1, 0.5, 0.0, -1.2, 0.0, 0.7, 0.2];
        let result = forward(&geo, &q, None);
        assert!(result.status.is_success());
    }

    #[test]
    fn forward_reports_global_configuration_signs() {
        let geo = geometry();
        let q = [0.1, -0.5, 0.0, 1.2, 0.0, -0.7, 0.2];
        let result = forward(&geo, &q, None);
        assert_eq!(result.global_configuration.shoulder, Sign::Negative);
        assert_eq!(result.global_configuration.elbow, Sign::Positive);
        assert_eq!(result.global_configuration.wrist, Sign::Negative);
    }

    #[test]
    fn arm_angle_stays_within_pi() {
        let geo = geometry();
        let q = [0.1, 0.5, 0.0, -1.2, 0.0, 0.7, 0.2];
        let result = forward(&geo, &q, None);
        assert!(result.arm_angle.abs() <= std::f64::consts::PI + 1e-9);
    }
}
