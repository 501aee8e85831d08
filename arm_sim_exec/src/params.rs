//! # Arm Simulator Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::JointVector;
use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ArmSimExecParams {
    /// Endpoint the bridge binds to
    pub endpoint: String,

    /// Scale applied to the real duration of blocking moves, zero to complete them instantly
    pub motion_time_scale: f64,

    /// Joint angles the simulated arm starts at.
    ///
    /// Units: degrees
    pub initial_pos_deg: JointVector,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ArmSimExecParams {
    fn default() -> Self {
        Self {
            endpoint: String::from("tcp://*:5020"),
            motion_time_scale: 1.0,
            initial_pos_deg: JointVector::default(),
        }
    }
}
