//! Parameters structure for ArmCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::JointKind;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Arm control.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Params {
    // ---- GEOMETRY ----
    /// Height of the first joint above the floor.
    ///
    /// Units: meters
    pub base_height_m: f64,

    /// The joints of the arm, from the base to the gripper.
    pub joints: Vec<JointParams>,

    // ---- PLANNING ----
    /// Targets closer to the base than this are not planned for.
    ///
    /// Units: meters
    pub min_plan_radius_m: f64,

    /// Fraction of the geometric reach within which the wrist-free planner is used.
    pub complex_range_margin: f64,

    /// Tilt of the shoulder and wrist pitch joints when a target is out of range.
    ///
    /// Units: radians
    pub out_of_range_tilt_rad: f64,

    /// Height of the end effector when pointing at or dropping on a target.
    ///
    /// Units: meters
    pub goal_height_m: f64,

    /// Height of the end effector when moving between targets.
    ///
    /// Units: meters
    pub transit_height_m: f64,

    /// Units: meters
    pub sweep_height_m: f64,

    /// Units: meters
    pub pre_grab_height_m: f64,

    /// Units: meters
    pub grab_height_m: f64,

    /// Multiple of the grab height given to the wrist-free planner.
    pub grab_complex_height_factor: f64,

    /// Multiple of the sweep height given to the wrist-free planner.
    pub sweep_complex_height_factor: f64,

    /// Offset of the base yaw from the target bearing while sweeping.
    ///
    /// Units: radians
    pub sweep_yaw_offset_rad: f64,

    // ---- GRIPPER ----
    /// Partially closed gripper position held whenever the gripper is not grabbing.
    ///
    /// Units: radians
    pub default_grip_rad: f64,

    /// Fully closed gripper position.
    ///
    /// Units: radians
    pub closed_grip_rad: f64,

    /// Step by which the grip is adjusted to bring the load into band.
    ///
    /// Units: radians
    pub grip_increment_rad: f64,

    /// Gripper positions within this of the default are considered open.
    ///
    /// Units: radians
    pub grip_tolerance_rad: f64,

    /// Lower bound of the normalised gripper load while holding an object.
    pub min_grip_load: f64,

    /// Upper bound of the normalised gripper load while holding an object.
    pub max_grip_load: f64,

    /// Distance of the grab approach point from the object.
    ///
    /// Units: meters
    pub grab_offset_m: f64,

    // ---- STABILITY ----
    /// Time over which the end effector must be still before a motion is complete.
    ///
    /// Units: seconds
    pub hold_time_s: f64,

    /// Mean deviation of the end effector below which it is considered still.
    ///
    /// Units: meters
    pub stable_error_m: f64,
}

/// Description of a single joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointParams {
    #[serde(flatten)]
    pub kind: JointKind,

    /// Length of the link following the joint.
    ///
    /// Units: meters
    pub length_m: f64,

    /// Normalised speed the joint is commanded at.
    pub speed: f64,

    /// Normalised maximum torque the joint is commanded with.
    pub torque: f64,

    /// Units: radians
    pub min_rad: f64,

    /// Units: radians
    pub max_rad: f64,
}

/// Parameters as found in the deployed `arm_ctrl.toml`, for use in tests.
#[cfg(test)]
pub(crate) fn test_params() -> Params {
    util::params::from_toml_str(include_str!("../../../params/arm_ctrl.toml"))
        .expect("arm_ctrl.toml is invalid")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arm_ctrl::JointAxis;

    #[test]
    fn test_load_deployed_params() {
        let params = test_params();

        assert_eq!(params.joints.len(), 6);
        assert_eq!(
            params.joints[0],
            JointParams {
                kind: JointKind::Revolute {
                    axis: JointAxis::Yaw
                },
                length_m: 0.04,
                speed: 0.2,
                torque: 0.6,
                min_rad: -3.14159,
                max_rad: 3.14159,
            }
        );
        assert_eq!(params.joints[5].kind, JointKind::Gripper);
        assert!(params.min_grip_load < params.max_grip_load);
    }
}
