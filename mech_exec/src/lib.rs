//! # Mechanisms library.
//!
//! Items of the mechanisms executable, exposed so they can be driven from tests and other
//! executables in the workspace.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm driver - writes joint demands to the servos and publishes their status.
pub mod driver;

/// Parameters for the mechanisms executable.
pub mod params;

/// Servo abstraction and the available servo buses.
pub mod servo_ctrl;
