//! # Mechanisms Equipment Commands
//!
//! Demands sent to, and status read back from, the arm's servos. On the wire the per-joint entries
//! are sent as lists, which must be converted into fixed sets of [`NUM_JOINTS`] entries before
//! use.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of joints on the arm, including the gripper.
pub const NUM_JOINTS: usize = 6;

/// Index of the base (yaw) joint.
pub const BASE_IDX: usize = 0;

/// Index of the gripper joint.
pub const GRIPPER_IDX: usize = 5;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A demand for a single joint.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct JointCommand {
    /// Index of the joint this command is for.
    pub joint_idx: usize,

    /// Demanded position of the joint.
    ///
    /// Units: radians
    pub pos_rad: f64,

    /// Normalised speed the joint should move at, in `[0, 1]`.
    pub speed: f64,

    /// Normalised maximum torque the joint may use, in `[0, 1]`.
    pub torque: f64,

    /// Time at which the command was created.
    pub timestamp: DateTime<Utc>,
}

/// Status of a single joint as sensed by its servo.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct JointStatus {
    /// Index of the joint this status is for.
    pub joint_idx: usize,

    /// Sensed position of the joint.
    ///
    /// Units: radians
    pub pos_rad: f64,

    /// Sensed normalised speed, signed, positive when the angle is increasing.
    pub speed: f64,

    /// Sensed normalised load, signed.
    pub load: f64,

    /// Supply voltage at the servo.
    ///
    /// Units: volts
    pub voltage: f64,

    /// Temperature of the servo.
    ///
    /// Units: degrees celsius
    pub temperature: f64,

    /// Raw error flags reported by the servo, zero if healthy.
    pub error_flags: u32,

    /// Time at which the status was read.
    pub timestamp: DateTime<Utc>,
}

/// A command for every joint of the arm, indexed by joint.
pub type JointCommandSet = [JointCommand; NUM_JOINTS];

/// A status for every joint of the arm, indexed by joint.
pub type JointStatusSet = [JointStatus; NUM_JOINTS];

/// Wire representation of a [`JointCommandSet`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JointCommandList {
    pub commands: Vec<JointCommand>,
}

/// Wire representation of a [`JointStatusSet`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JointStatusList {
    pub statuses: Vec<JointStatus>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Error raised when a received list does not contain exactly one entry per joint.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Expected {} joint entries, found {0}", NUM_JOINTS)]
pub struct SetLengthError(pub usize);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointCommand {
    /// Create a new command, clamping speed and torque into `[0, 1]`.
    pub fn new(
        joint_idx: usize,
        pos_rad: f64,
        speed: f64,
        torque: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            joint_idx,
            pos_rad,
            speed: clamp_unit(speed),
            torque: clamp_unit(torque),
            timestamp,
        }
    }

    /// Return a copy of this command with speed and torque clamped into `[0, 1]`.
    ///
    /// Commands received over the bus may have come from anywhere, so this must be applied before
    /// passing them on to hardware.
    pub fn clamped(&self) -> Self {
        Self::new(
            self.joint_idx,
            self.pos_rad,
            self.speed,
            self.torque,
            self.timestamp,
        )
    }

    /// True if the demanded position, speed, or torque differ from `other`.
    pub fn demand_differs(&self, other: &JointCommand) -> bool {
        self.pos_rad != other.pos_rad || self.speed != other.speed || self.torque != other.torque
    }
}

impl JointCommandList {
    /// Convert the list into a set, checking there is exactly one entry per joint.
    pub fn into_set(self) -> Result<JointCommandSet, SetLengthError> {
        let len = self.commands.len();
        into_array(self.commands).ok_or(SetLengthError(len))
    }
}

impl From<&JointCommandSet> for JointCommandList {
    fn from(set: &JointCommandSet) -> Self {
        Self {
            commands: set.to_vec(),
        }
    }
}

impl JointStatusList {
    /// Convert the list into a set, checking there is exactly one entry per joint.
    pub fn into_set(self) -> Result<JointStatusSet, SetLengthError> {
        let len = self.statuses.len();
        into_array(self.statuses).ok_or(SetLengthError(len))
    }
}

/// Earliest timestamp in a status set, used as the arrival time of the whole set.
pub fn oldest_timestamp(set: &JointStatusSet) -> DateTime<Utc> {
    set.iter()
        .map(|s| s.timestamp)
        .min()
        .unwrap_or_else(Utc::now)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn into_array<T>(v: Vec<T>) -> Option<[T; NUM_JOINTS]> {
    use std::convert::TryInto;

    v.try_into().ok()
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.max(0.0).min(1.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn status(joint_idx: usize, timestamp: DateTime<Utc>) -> JointStatus {
        JointStatus {
            joint_idx,
            pos_rad: 0.0,
            speed: 0.0,
            load: 0.0,
            voltage: 12.0,
            temperature: 30.0,
            error_flags: 0,
            timestamp,
        }
    }

    #[test]
    fn test_command_clamps() {
        let cmd = JointCommand::new(0, 1.0, 1.7, -0.2, Utc::now());
        assert_eq!(cmd.speed, 1.0);
        assert_eq!(cmd.torque, 0.0);

        let raw = JointCommand {
            speed: f64::NAN,
            torque: 3.0,
            ..cmd
        };
        let clamped = raw.clamped();
        assert_eq!(clamped.speed, 0.0);
        assert_eq!(clamped.torque, 1.0);
    }

    #[test]
    fn test_list_length_checked() {
        let now = Utc::now();
        let list = JointStatusList {
            statuses: (0..5).map(|i| status(i, now)).collect(),
        };
        assert_eq!(list.into_set(), Err(SetLengthError(5)));

        let list = JointStatusList {
            statuses: (0..NUM_JOINTS).map(|i| status(i, now)).collect(),
        };
        let set = list.into_set().unwrap();
        assert_eq!(set[GRIPPER_IDX].joint_idx, GRIPPER_IDX);
    }

    #[test]
    fn test_oldest_timestamp() {
        let now = Utc::now();
        let mut set = [status(0, now); NUM_JOINTS];
        set[3].timestamp = now - chrono::Duration::milliseconds(30);

        assert_eq!(oldest_timestamp(&set), now - chrono::Duration::milliseconds(30));
    }

    #[test]
    fn test_list_json_decode_rejects_short_list() {
        let now = Utc::now();
        let list = JointCommandList {
            commands: (0..3)
                .map(|i| JointCommand::new(i, 0.0, 0.5, 0.5, now))
                .collect(),
        };
        let json = serde_json::to_string(&list).unwrap();
        let decoded: JointCommandList = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.into_set(), Err(SetLengthError(3)));
    }
}
