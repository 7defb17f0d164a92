//! # Arm library.
//!
//! This library allows other crates in the workspace to access items defined inside the arm
//! crate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Arm client - receives joint status and arm commands from the bus
pub mod arm_client;

/// Arm control module - converts high level arm commands into individual joint demands
pub mod arm_ctrl;

/// Queue of arm commands waiting to be executed
pub mod cmd_queue;

/// Fixed rate loop running arm control
pub mod control_loop;

/// Parameters of the executable
pub mod params;
