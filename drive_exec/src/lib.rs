//! # Drive library.
//!
//! This library allows other crates in the workspace, and the integration tests, to access items
//! defined inside the drive crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Drive loop - ties the command server, motors and watchdog together
pub mod drive_loop;

/// Drive server - recieves commands from clients and sends back replies
pub mod drive_server;

/// Motor control - drives the left and right motors
pub mod motor_ctrl;

/// Parameters for the drive executable
pub mod params;

/// Command watchdog - detects when commands stop arriving
pub mod watchdog;
