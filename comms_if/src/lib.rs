//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the arm software: the messages exchanged
//! between executables and the bus they are exchanged over.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands sent to the arm controller
pub mod tc;

/// Telemetry published by the arm controller
pub mod tm;

/// Command and status definitions for equipment (like the servos)
pub mod eqpt;

/// Network module
pub mod net;
