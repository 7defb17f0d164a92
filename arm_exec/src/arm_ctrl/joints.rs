//! Joints of the arm and forward kinematics over them

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use comms_if::eqpt::mech::JointCommand;
use nalgebra::{Isometry3, Vector3};
use serde::{Deserialize, Serialize};

use super::JointParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A joint of the arm and its current demanded angle.
///
/// The geometry of the joint is fixed at construction, only the angle changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    kind: JointKind,
    length_m: f64,
    speed: f64,
    torque: f64,
    min_rad: f64,
    max_rad: f64,
    angle_rad: f64,
}

/// Static description of the arm's links, derived from the joints.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmGeometry {
    /// Units: meters
    pub base_height_m: f64,

    /// Length of the link following each joint.
    ///
    /// Units: meters
    pub link_m: [f64; comms_if::eqpt::mech::NUM_JOINTS],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The kind of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JointKind {
    /// A rotational joint about one of its local axes.
    Revolute { axis: JointAxis },

    /// The gripper, whose angle sets the opening of the hand and does not move the end effector.
    Gripper,
}

/// Local axis of rotation of a revolute joint.
///
/// Links extend along the local Z axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointAxis {
    /// Rotation about the link axis at the base.
    Yaw,

    /// Rotation about the local Y axis, tilting the following links away from vertical.
    Pitch,

    /// Rotation about the link axis at the wrist.
    Roll,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Joint {
    /// Create a joint from its parameters, starting at the angle within its limits closest to
    /// zero.
    pub fn from_params(params: &JointParams) -> Self {
        let mut joint = Self {
            kind: params.kind,
            length_m: params.length_m,
            speed: params.speed,
            torque: params.torque,
            min_rad: params.min_rad,
            max_rad: params.max_rad,
            angle_rad: 0.0,
        };
        joint.set(0.0);
        joint
    }

    /// Set the demanded angle of the joint, clamping it into the joint's limits.
    ///
    /// Returns `true` if the angle was limited. A non-finite angle is rejected, leaving the
    /// current angle in place.
    pub fn set(&mut self, angle_rad: f64) -> bool {
        if !angle_rad.is_finite() {
            return true;
        }

        self.angle_rad = angle_rad.max(self.min_rad).min(self.max_rad);

        self.angle_rad != angle_rad
    }

    pub fn angle_rad(&self) -> f64 {
        self.angle_rad
    }

    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    pub fn kind(&self) -> JointKind {
        self.kind
    }

    /// Nominal normalised speed of the joint.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Build the hardware command for this joint.
    pub fn to_command(&self, joint_idx: usize, timestamp: DateTime<Utc>) -> JointCommand {
        JointCommand::new(joint_idx, self.angle_rad, self.speed, self.torque, timestamp)
    }

    /// Transform from the joint's parent frame to the end of its link, at the given angle.
    pub fn transform(&self, angle_rad: f64) -> Isometry3<f64> {
        let rotation = match self.kind {
            JointKind::Revolute {
                axis: JointAxis::Yaw,
            }
            | JointKind::Revolute {
                axis: JointAxis::Roll,
            } => Isometry3::rotation(Vector3::z() * angle_rad),
            JointKind::Revolute {
                axis: JointAxis::Pitch,
            } => Isometry3::rotation(Vector3::y() * angle_rad),
            JointKind::Gripper => Isometry3::identity(),
        };

        rotation * Isometry3::translation(0.0, 0.0, self.length_m)
    }
}

impl ArmGeometry {
    pub fn from_joints(base_height_m: f64, joints: &[Joint]) -> Self {
        let mut link_m = [0.0; comms_if::eqpt::mech::NUM_JOINTS];

        for (l, j) in link_m.iter_mut().zip(joints.iter()) {
            *l = j.length_m;
        }

        Self {
            base_height_m,
            link_m,
        }
    }

    /// Height of the shoulder (the first pitch joint) above the floor.
    pub fn shoulder_height_m(&self) -> f64 {
        self.base_height_m + self.link_m[0]
    }

    /// Combined length of the links after the elbow, forming the wrist and hand.
    pub fn hand_length_m(&self) -> f64 {
        self.link_m[3] + self.link_m[4] + self.link_m[5]
    }
}

/// Compute the position of the end effector with the joints at the given angles.
///
/// Units: meters,
/// Frame: Arm base, origin on the base yaw axis at floor level
pub fn forward_kinematics(
    base_height_m: f64,
    joints: &[Joint],
    angles_rad: &[f64],
) -> Vector3<f64> {
    let mut xform = Isometry3::translation(0.0, 0.0, base_height_m);

    for (joint, angle) in joints.iter().zip(angles_rad.iter()) {
        xform *= joint.transform(*angle);
    }

    xform.translation.vector
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arm_ctrl::params::test_params;
    use std::f64::consts::FRAC_PI_2;

    fn joints() -> Vec<Joint> {
        test_params()
            .joints
            .iter()
            .map(Joint::from_params)
            .collect()
    }

    #[test]
    fn test_set_limits() {
        let mut j = Joint::from_params(&test_params().joints[1]);

        assert!(!j.set(1.0));
        assert_eq!(j.angle_rad(), 1.0);

        assert!(j.set(10.0));
        assert_eq!(j.angle_rad(), 2.6);

        assert!(j.set(f64::NAN));
        assert_eq!(j.angle_rad(), 2.6);
    }

    #[test]
    fn test_fk_upright() {
        let params = test_params();
        let ee = forward_kinematics(params.base_height_m, &joints(), &[0.0; 6]);

        assert!(ee.x.abs() < 1e-12);
        assert!(ee.y.abs() < 1e-12);
        assert!((ee.z - (0.075 + 0.04 + 0.1 + 0.1 + 0.04 + 0.03 + 0.08)).abs() < 1e-12);
    }

    #[test]
    fn test_fk_shoulder_and_yaw() {
        let params = test_params();

        // Shoulder tilted flat, base yawed to +Y
        let ee = forward_kinematics(
            params.base_height_m,
            &joints(),
            &[FRAC_PI_2, FRAC_PI_2, 0.0, 0.0, 0.0, 1.0],
        );

        assert!(ee.x.abs() < 1e-12);
        assert!((ee.y - 0.35).abs() < 1e-12);
        assert!((ee.z - 0.115).abs() < 1e-12);
    }

    #[test]
    fn test_gripper_does_not_move_end_effector() {
        let params = test_params();
        let a = forward_kinematics(params.base_height_m, &joints(), &[0.3, 0.4, 0.5, 0.6, 0.7, 0.0]);
        let b = forward_kinematics(params.base_height_m, &joints(), &[0.3, 0.4, 0.5, 0.6, 0.7, 1.5]);

        assert!((a - b).norm() < 1e-12);
    }
}
