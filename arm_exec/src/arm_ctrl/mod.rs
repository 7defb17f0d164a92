//! Arm control module
//!
//! Converts high level [`ArmCmd`](comms_if::tc::arm_ctrl::ArmCmd)s into joint demands. Each
//! action is a short sequence of states, each of which positions the arm (or the gripper) and
//! waits for it to settle before moving on.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_drop;
mod calc_grab;
mod calc_point;
mod calc_reset;
mod calc_sweep;
mod inverse_kinematics;
mod joints;
pub(crate) mod params;
mod pos_tracker;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use inverse_kinematics::*;
pub use joints::*;
pub use params::*;
pub use pos_tracker::PositionTracker;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during ArmCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum ArmCtrlError {
    #[error("Could not load the ArmCtrl parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("Expected {} joints, found {0}", comms_if::eqpt::mech::NUM_JOINTS)]
    InvalidJointCount(usize),

    #[error("Joint {0} is of the wrong kind, the last joint must be the gripper and no other")]
    InvalidJointKind(usize),

    #[error("The cycle frequency must be positive, found {0} Hz")]
    InvalidCycleFrequency(f64),

    #[error("ArmCtrl has not been initialised")]
    NotInitialised,
}
