//! # Telemetry module
//!
//! Status published by the arm controller every cycle.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Summary of what the arm is doing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmStatus {
    /// Time at which the status was generated.
    pub timestamp: DateTime<Utc>,

    /// The action currently being performed.
    pub mode: ActionMode,

    /// ID of the object currently held, 0 if nothing is held.
    pub held_obj_id: u32,

    /// Position of the end effector, if the joint status is known.
    ///
    /// Units: meters,
    /// Frame: Arm base
    pub ee_pos_m: Option<[f64; 3]>,

    /// ID of the command being executed, if any.
    pub cmd_id: Option<u64>,

    /// Index of the state within the current action's sequence.
    pub state_idx: usize,

    /// Mean deviation of the end effector from its mean position over the hold window, `None`
    /// while there is not enough history to judge.
    ///
    /// Units: meters
    pub pos_error_m: Option<f64>,

    /// The planning strategy used to position the arm on this cycle, if any.
    pub plan: Option<PlanKind>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The high level action currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionMode {
    Wait,
    Point,
    Grab,
    Drop,
    Sweep,
}

/// Strategy used by the inverse kinematics to reach a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// Gripper pointing straight down, used close to the base.
    WristDown,

    /// Wrist free to take any orientation, used at longer range.
    WristFree,

    /// Target is out of reach, the arm is tilted towards it.
    OutOfRange,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ActionMode {
    fn default() -> Self {
        ActionMode::Wait
    }
}
