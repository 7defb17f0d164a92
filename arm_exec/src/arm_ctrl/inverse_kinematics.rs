//! Arm inverse kinematics calculations
//!
//! The arm is treated as a planar chain in the vertical plane containing the target, with the
//! base yaw pointing that plane at the target. Which planner is used depends on how far the
//! target is from the base:
//!
//! - Close in, the hand is held pointing straight down (`WristDown`), which is best for
//!   grabbing. The shoulder and elbow place the wrist directly above the target.
//! - Further out the upper and fore arm are locked straight and the wrist is free to take any
//!   pitch (`WristFree`).
//! - Beyond that the arm is simply tilted towards the target (`OutOfRange`).
//!
//! Any degenerate geometry in the first two planners falls back to the out of range pose, so the
//! output is always finite.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::{FRAC_PI_2, PI};

pub use comms_if::tm::PlanKind;

use super::{ArmGeometry, Params};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of joints positioned by the inverse kinematics, the gripper is not included.
pub const NUM_IK_JOINTS: usize = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Output of the inverse kinematics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkSolution {
    /// The planner which produced the solution.
    pub plan: PlanKind,

    /// Angles of the base, shoulder, elbow, wrist pitch and wrist roll joints.
    ///
    /// Units: radians
    pub pos_rad: [f64; NUM_IK_JOINTS],
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Calculate the joint angles needed to place the end effector over `target_xy_m`.
///
/// The wrist-down and wrist-free planners are given separate heights, since the wrist-free
/// planner reaches the target at an angle.
///
/// Returns `None` if the target is too close to the base to be planned for, in which case the
/// arm should be left where it is.
pub fn calc_inverse_kinematics(
    geom: &ArmGeometry,
    params: &Params,
    target_xy_m: [f64; 2],
    height_simple_m: f64,
    height_complex_m: f64,
    wrist_rad: f64,
) -> Option<IkSolution> {
    let [x, y] = target_xy_m;
    let r = x.hypot(y);

    // Also rejects NaN targets
    if !(r >= params.min_plan_radius_m) {
        return None;
    }

    let yaw = y.atan2(x);
    let (max_simple_r, max_complex_r) = reach_limits(geom, params, height_simple_m, height_complex_m);

    let solution = if r < max_simple_r {
        wrist_down(geom, r, height_simple_m).map(|t| (PlanKind::WristDown, t))
    } else if r < max_complex_r {
        wrist_free(geom, r, height_complex_m).map(|t| (PlanKind::WristFree, t))
    } else {
        None
    };

    let (plan, [t1, t2, t3]) = solution.unwrap_or_else(|| {
        (
            PlanKind::OutOfRange,
            [
                FRAC_PI_2 - params.out_of_range_tilt_rad,
                0.0,
                params.out_of_range_tilt_rad,
            ],
        )
    });

    Some(IkSolution {
        plan,
        pos_rad: [yaw, t1, t2, t3, wrist_rad],
    })
}

/// Maximum planar radius of the wrist-down and the wrist-free planners at the given heights.
pub fn reach_limits(
    geom: &ArmGeometry,
    params: &Params,
    height_simple_m: f64,
    height_complex_m: f64,
) -> (f64, f64) {
    let l = &geom.link_m;
    let h0 = geom.shoulder_height_m();
    let arm_m = l[1] + l[2];

    let q0 = geom.hand_length_m() + height_simple_m - h0;
    let max_simple_r = (arm_m * arm_m - q0 * q0).max(0.0).sqrt();

    let q1 = if height_complex_m < h0 {
        height_complex_m
    } else {
        height_complex_m - h0
    };
    let reach_m = arm_m + geom.hand_length_m();
    let max_complex_r = (reach_m * reach_m - q1 * q1).max(0.0).sqrt() * params.complex_range_margin;

    (max_simple_r, max_complex_r)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Shoulder, elbow and wrist pitch angles with the hand pointing straight down.
fn wrist_down(geom: &ArmGeometry, r: f64, height_m: f64) -> Option<[f64; 3]> {
    let l = &geom.link_m;

    // Vector from the shoulder to the wrist pitch joint, which sits directly above the target
    let h = (geom.hand_length_m() + height_m) - geom.shoulder_height_m();
    let lp = h.hypot(r);

    let g0 = checked_acos((l[1] * l[1] + l[2] * l[2] - lp * lp) / (2.0 * l[1] * l[2]))?;
    let g1 = checked_acos((l[1] * l[1] + lp * lp - l[2] * l[2]) / (2.0 * l[1] * lp))?;

    // Angle of the shoulder-wrist line from vertical
    let alpha = FRAC_PI_2 - h.atan2(r);

    let t1 = alpha - g1;
    let t2 = PI - g0;
    let t3 = PI - t1 - t2;

    finite([t1, t2, t3])
}

/// Shoulder and wrist pitch angles with the upper and fore arm held straight.
fn wrist_free(geom: &ArmGeometry, r: f64, height_m: f64) -> Option<[f64; 3]> {
    let l = &geom.link_m;

    // Drop from the shoulder to the target
    let h = geom.shoulder_height_m() - height_m;
    let lp = h.hypot(r);

    let l1 = l[1] + l[2];
    let l2 = geom.hand_length_m();

    let g0 = checked_acos(h / lp)?;
    let g2 = checked_acos((l1 * l1 + l2 * l2 - lp * lp) / (2.0 * l1 * l2))?;
    let g3 = checked_acos((l1 * l1 + lp * lp - l2 * l2) / (2.0 * l1 * lp))?;

    finite([PI - g0 - g3, 0.0, PI - g2])
}

fn checked_acos(x: f64) -> Option<f64> {
    if (-1.0..=1.0).contains(&x) {
        Some(x.acos())
    } else {
        None
    }
}

fn finite(t: [f64; 3]) -> Option<[f64; 3]> {
    if t.iter().all(|a| a.is_finite()) {
        Some(t)
    } else {
        None
    }
}
