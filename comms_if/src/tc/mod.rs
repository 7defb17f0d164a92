//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface. Telecommands are the high level instructions sent to the arm
//! controller by an operator or a planner.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod arm_ctrl;
