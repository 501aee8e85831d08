//! # Arm Executable Parameters
//!
//! This module provides parameters for the arm executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::arm::JointVector;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the arm session, constant for the lifetime of the process.
///
/// Any field missing from the parameter file takes its default value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmExecParams {
    /// Network endpoint of the arm bridge
    pub arm_endpoint: String,

    // ---- MOTION ----
    /// Safe joint configuration the arm is moved to at startup.
    ///
    /// Units: degrees
    pub home_pos_deg: JointVector,

    /// Speed of moves to the home position.
    ///
    /// Units: degrees/second
    pub home_speed_degs: f64,

    /// Lowest speed an operator may command.
    ///
    /// Units: degrees/second
    pub min_speed_degs: f64,

    /// Highest speed an operator may command.
    ///
    /// Units: degrees/second
    pub max_speed_degs: f64,

    /// Joint changes larger than this (absolute) need explicit operator confirmation.
    ///
    /// Units: degrees
    pub confirm_threshold_deg: f64,

    /// Largest absolute joint angle a jog may command.
    ///
    /// Units: degrees
    pub joint_limit_deg: f64,

    /// Time to wait for the controller to settle after changing state.
    ///
    /// Units: seconds
    pub settle_time_s: f64,

    // ---- NETWORK ----
    /// Time allowed to establish the connection to the bridge.
    ///
    /// Units: milliseconds
    pub connect_timeout_ms: i32,

    /// Time allowed for the reply to a non-motion call.
    ///
    /// Units: milliseconds
    pub call_timeout_ms: i32,

    /// Time allowed for the reply to a blocking move on top of the longest motion it could make.
    ///
    /// Units: milliseconds
    pub move_margin_ms: i32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Reasons a set of parameters can't be used.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error("Speed bounds must satisfy 0 < min <= max, got {0} to {1}")]
    InvalidSpeedBounds(f64, f64),

    #[error("The home speed of {0} deg/s is outside the speed bounds")]
    InvalidHomeSpeed(f64),

    #[error("The home position {0} exceeds the joint limit of {1} deg")]
    InvalidHome(JointVector, f64),

    #[error("Parameter {0} must be a finite, non-negative number")]
    Invalid(&'static str),

    #[error("Timeout {0} must be a positive number of milliseconds, got {1}")]
    InvalidTimeout(&'static str, i32),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmExecParams {
    /// Check that the parameters are self-consistent.
    pub fn validate(&self) -> Result<(), ParamsError> {
        for (name, value) in [
            ("confirm_threshold_deg", self.confirm_threshold_deg),
            ("joint_limit_deg", self.joint_limit_deg),
            ("settle_time_s", self.settle_time_s),
        ]
        .iter()
        {
            if !value.is_finite() || *value < 0.0 {
                return Err(ParamsError::Invalid(*name));
            }
        }

        for (name, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("call_timeout_ms", self.call_timeout_ms),
            ("move_margin_ms", self.move_margin_ms),
        ]
        .iter()
        {
            if *value <= 0 {
                return Err(ParamsError::InvalidTimeout(*name, *value));
            }
        }

        if !(self.min_speed_degs > 0.0 && self.min_speed_degs <= self.max_speed_degs)
            || !self.max_speed_degs.is_finite()
        {
            return Err(ParamsError::InvalidSpeedBounds(
                self.min_speed_degs,
                self.max_speed_degs,
            ));
        }

        if !(self.min_speed_degs..=self.max_speed_degs).contains(&self.home_speed_degs) {
            return Err(ParamsError::InvalidHomeSpeed(self.home_speed_degs));
        }

        if !self.home_pos_deg.is_finite()
            || self
                .home_pos_deg
                .0
                .iter()
                .any(|a| a.abs() > self.joint_limit_deg)
        {
            return Err(ParamsError::InvalidHome(
                self.home_pos_deg,
                self.joint_limit_deg,
            ));
        }

        Ok(())
    }
}

impl Default for ArmExecParams {
    fn default() -> Self {
        Self {
            arm_endpoint: String::from("tcp://192.168.1.231:5020"),
            home_pos_deg: JointVector([103.7, -24.3, -1.9, 26.2, 14.8]),
            home_speed_degs: 10.0,
            min_speed_degs: 1.0,
            max_speed_degs: 30.0,
            confirm_threshold_deg: 30.0,
            joint_limit_deg: 180.0,
            settle_time_s: 1.0,
            connect_timeout_ms: 2000,
            call_timeout_ms: 2000,
            move_margin_ms: 10_000,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(ArmExecParams::default().validate(), Ok(()));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let params: ArmExecParams = toml::from_str(
            "arm_endpoint = \"tcp://localhost:5020\"\nsettle_time_s = 0.5\n",
        )
        .unwrap();

        assert_eq!(params.arm_endpoint, "tcp://localhost:5020");
        assert_eq!(params.settle_time_s, 0.5);
        assert_eq!(params.max_speed_degs, 30.0);
        assert_eq!(
            params.home_pos_deg,
            JointVector([103.7, -24.3, -1.9, 26.2, 14.8])
        );
    }

    #[test]
    fn test_invalid_params() {
        let params = ArmExecParams {
            min_speed_degs: 40.0,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(ParamsError::InvalidSpeedBounds(40.0, 30.0))
        );

        let params = ArmExecParams {
            home_speed_degs: 50.0,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(ParamsError::InvalidHomeSpeed(50.0)));

        let params = ArmExecParams {
            home_pos_deg: JointVector([190.0, 0.0, 0.0, 0.0, 0.0]),
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ParamsError::InvalidHome(_, _))
        ));

        let params = ArmExecParams {
            settle_time_s: -1.0,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(ParamsError::Invalid("settle_time_s"))
        );
    }

    #[test]
    fn test_timeouts_must_be_positive() {
        let params = ArmExecParams {
            call_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(ParamsError::InvalidTimeout("call_timeout_ms", 0))
        );

        let params = ArmExecParams {
            connect_timeout_ms: -1,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(ParamsError::InvalidTimeout("connect_timeout_ms", -1))
        );

        let params: ArmExecParams = toml::from_str("move_margin_ms = -5\n").unwrap();
        assert_eq!(
            params.validate(),
            Err(ParamsError::InvalidTimeout("move_margin_ms", -5))
        );
    }
}
