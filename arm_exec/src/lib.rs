//! # Arm Library
//!
//! Everything behind the arm executable, so that it can be tested without a terminal or an arm.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Network client for the arm bridge.
pub mod arm_client;

/// Connection lifecycle and motion sequencing.
pub mod arm_session;

pub mod console;

/// Operator menu.
pub mod menu;

pub mod params;
