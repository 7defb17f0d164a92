//! # Servo Controller Module
//!
//! This module provides a unified servo interface which can abstract over different servo buses.
//! A bus gives out a handle to each joint's servo, through which goals are set and status is
//! read back.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`ServoBus`] implementation simulating the arm's servos.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;
use std::sync::Arc;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API for accessing servo buses.
pub trait ServoBus {
    /// Get the servo of a joint, or `None` if it does not respond.
    fn get_joint(&self, joint_idx: usize) -> Option<Arc<dyn JointHandle>>;
}

/// A single servo on a [`ServoBus`].
///
/// Handles are shared between the command and status threads, so all methods take `&self`.
pub trait JointHandle: Send + Sync {
    /// Name of the servo model, for logging.
    fn model(&self) -> &str;

    /// Set the goal of the servo.
    ///
    /// ## Arguments
    /// - `pos_rad` - The goal position
    /// - `speed` - Normalised speed, between 0.0 and 1.0
    /// - `torque` - Normalised maximum torque, between 0.0 and 1.0
    fn set_goal(&self, pos_rad: f64, speed: f64, torque: f64) -> Result<(), ServoError>;

    /// Read the current status of the servo.
    fn get_status(&self) -> Result<ServoStatus, ServoError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Status read back from a servo.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServoStatus {
    /// Units: radians
    pub pos_rad: f64,

    /// Signed speed as a fraction of the servo's maximum.
    pub speed: f64,

    /// Signed load as a fraction of the servo's maximum.
    pub load: f64,

    /// Units: volts
    pub voltage: f64,

    /// Units: degrees celsius
    pub temperature: f64,

    pub error_flags: u32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ServoError {
    #[error("The servo is not responding")]
    NotResponding,

    #[error("Goal position must be finite, got {0}")]
    InvalidGoal(f64),
}
