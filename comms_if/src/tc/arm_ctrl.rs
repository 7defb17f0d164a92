//! # Arm control telecommands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A high level manipulation command for the arm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmCmd {
    /// Identifier of the logical command.
    ///
    /// Re-sending a command with the same ID must not restart it, a new ID
    /// shall be used for every new logical command.
    pub cmd_id: u64,

    /// The action to perform.
    pub action: ArmAction,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Actions the arm can perform.
///
/// All positions are in the arm base frame, with the origin on the base's
/// yaw axis at floor level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ArmAction {
    /// Point the end effector at a location, stopping just above it.
    Point {
        /// Units: meters
        target_xy_m: [f64; 2],

        /// Units: radians
        wrist_rad: f64,
    },

    /// Grab the object at a location.
    Grab {
        /// Units: meters
        target_xy_m: [f64; 2],

        /// Units: radians
        wrist_rad: f64,

        /// ID of the object to be grabbed, reported back once it is held.
        obj_id: u32,
    },

    /// Drop the held object at a location.
    Drop {
        /// Units: meters
        target_xy_m: [f64; 2],

        /// Units: radians
        wrist_rad: f64,
    },

    /// Sweep the end effector through a location.
    Sweep {
        /// Units: meters
        target_xy_m: [f64; 2],

        /// Units: radians
        wrist_rad: f64,
    },

    /// Return every joint to zero and the gripper to its default position.
    Reset,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmAction {
    /// The target location of the action, if it has one.
    pub fn target_xy_m(&self) -> Option<[f64; 2]> {
        match self {
            ArmAction::Point { target_xy_m, .. }
            | ArmAction::Grab { target_xy_m, .. }
            | ArmAction::Drop { target_xy_m, .. }
            | ArmAction::Sweep { target_xy_m, .. } => Some(*target_xy_m),
            ArmAction::Reset => None,
        }
    }

    /// The demanded wrist angle of the action, zero for reset.
    pub fn wrist_rad(&self) -> f64 {
        match self {
            ArmAction::Point { wrist_rad, .. }
            | ArmAction::Grab { wrist_rad, .. }
            | ArmAction::Drop { wrist_rad, .. }
            | ArmAction::Sweep { wrist_rad, .. } => *wrist_rad,
            ArmAction::Reset => 0.0,
        }
    }
}
