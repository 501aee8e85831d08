//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the arm software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and response definitions for equipment (like the arm controller)
pub mod eqpt;

/// Network module
pub mod net;
