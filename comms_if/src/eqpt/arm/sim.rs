//! # Simulated Arm Controller
//!
//! An in-memory implementation of [`ArmApi`] which behaves like a well mannered controller. Every
//! call is recorded so that callers can check exactly which remote calls were made, and faults
//! can be injected per call.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use std::{collections::HashMap, thread, time::Duration};

use super::*;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Code returned when a motion is commanded while the arm is not ready to move.
pub const NOT_READY: i32 = 9;

/// Code returned when a motion target is outside the joint range.
pub const PARAM_ERROR: i32 = 8;

/// Maximum absolute joint angle accepted by the simulation.
pub const JOINT_RANGE_DEG: f64 = 180.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulated arm controller.
#[derive(Debug)]
pub struct SimArm {
    /// Every request made against this arm, in order.
    pub calls: Vec<ArmRequest>,

    /// Current joint angles.
    pub angles_deg: JointVector,

    /// If set `connect` fails with a transport error.
    pub unreachable: bool,

    /// Scale applied to the real duration of blocking moves. Zero completes moves instantly.
    pub motion_time_scale: f64,

    connected: bool,

    motion_enabled: bool,

    mode: ArmMode,

    state: ArmState,

    faults: HashMap<ArmCall, i32>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimArm {
    /// Create a new simulated arm, stopped with all joints at zero.
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            angles_deg: JointVector::default(),
            unreachable: false,
            motion_time_scale: 0.0,
            connected: false,
            motion_enabled: false,
            mode: ArmMode::Position,
            state: ArmState::Stop,
            faults: HashMap::new(),
        }
    }

    /// Create a new simulated arm at the given joint angles.
    pub fn at(angles_deg: JointVector) -> Self {
        Self {
            angles_deg,
            ..Self::new()
        }
    }

    /// Make every future `call` fail with the given controller code.
    pub fn inject_fault(&mut self, call: ArmCall, code: i32) {
        self.faults.insert(call, code);
    }

    /// Remove a fault previously injected with [`SimArm::inject_fault`].
    pub fn clear_fault(&mut self, call: ArmCall) {
        self.faults.remove(&call);
    }

    /// Number of times the given call has been made.
    pub fn count(&self, call: ArmCall) -> usize {
        self.calls.iter().filter(|r| r.call() == call).count()
    }

    /// All motion targets commanded so far, with their speeds.
    pub fn moves(&self) -> Vec<(JointVector, f64)> {
        self.calls
            .iter()
            .filter_map(|r| match r {
                ArmRequest::SetServoAngle {
                    angles_deg,
                    speed_degs,
                    ..
                } => Some((*angles_deg, *speed_degs)),
                _ => None,
            })
            .collect()
    }

    /// Whether the simulated connection is open.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Record the call and apply the common connection and fault checks.
    fn begin(&mut self, request: ArmRequest) -> Result<(), ArmError> {
        trace!("SimArm <- {:?}", request);

        let call = request.call();
        self.calls.push(request);

        if !self.connected && call != ArmCall::Connect && call != ArmCall::Disconnect {
            return Err(ArmError::NotConnected);
        }

        match self.faults.get(&call) {
            Some(code) => Err(ArmError::Code(*code)),
            None => Ok(()),
        }
    }
}

impl Default for SimArm {
    fn default() -> Self {
        Self::new()
    }
}

impl ArmApi for SimArm {
    fn connect(&mut self) -> Result<(), ArmError> {
        self.begin(ArmRequest::Connect)?;

        if self.unreachable {
            return Err(ArmError::Transport("Simulated controller is unreachable".into()));
        }

        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ArmError> {
        self.begin(ArmRequest::Disconnect)?;
        self.connected = false;
        self.motion_enabled = false;
        Ok(())
    }

    fn clean_error(&mut self) -> Result<(), ArmError> {
        self.begin(ArmRequest::CleanError)
    }

    fn motion_enable(&mut self, enable: bool) -> Result<(), ArmError> {
        self.begin(ArmRequest::MotionEnable { enable })?;
        self.motion_enabled = enable;
        Ok(())
    }

    fn set_mode(&mut self, mode: ArmMode) -> Result<(), ArmError> {
        self.begin(ArmRequest::SetMode { mode })?;
        self.mode = mode;
        Ok(())
    }

    fn set_state(&mut self, state: ArmState) -> Result<(), ArmError> {
        self.begin(ArmRequest::SetState { state })?;
        self.state = state;
        Ok(())
    }

    fn set_servo_angle(
        &mut self,
        angles_deg: &JointVector,
        speed_degs: f64,
        wait: bool,
    ) -> Result<(), ArmError> {
        self.begin(ArmRequest::SetServoAngle {
            angles_deg: *angles_deg,
            speed_degs,
            wait,
        })?;

        if !self.motion_enabled || self.mode != ArmMode::Position || self.state != ArmState::Ready
        {
            return Err(ArmError::Code(NOT_READY));
        }
        if !angles_deg.is_finite()
            || angles_deg.0.iter().any(|a| a.abs() > JOINT_RANGE_DEG)
            || !(speed_degs > 0.0)
        {
            return Err(ArmError::Code(PARAM_ERROR));
        }

        let travel_deg = angles_deg.max_travel_deg(&self.angles_deg);
        if wait && self.motion_time_scale > 0.0 {
            let secs = travel_deg / speed_degs * self.motion_time_scale;
            debug!("SimArm moving {:.1} deg, waiting {:.2} s", travel_deg, secs);
            thread::sleep(Duration::from_secs_f64(secs));
        }

        self.angles_deg = *angles_deg;
        Ok(())
    }

    fn get_servo_angle(&mut self) -> Result<JointVector, ArmError> {
        self.begin(ArmRequest::GetServoAngle)?;
        Ok(self.angles_deg)
    }

    fn get_state(&mut self) -> Result<i32, ArmError> {
        self.begin(ArmRequest::GetState)?;
        Ok(self.state.code())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_arm() -> SimArm {
        let mut arm = SimArm::new();
        arm.connect().unwrap();
        arm.motion_enable(true).unwrap();
        arm.set_mode(ArmMode::Position).unwrap();
        arm.set_state(ArmState::Ready).unwrap();
        arm
    }

    #[test]
    fn test_calls_require_connection() {
        let mut arm = SimArm::new();
        assert_eq!(arm.get_servo_angle(), Err(ArmError::NotConnected));
        assert_eq!(arm.disconnect(), Ok(()));
        assert_eq!(arm.count(ArmCall::GetServoAngle), 1);
    }

    #[test]
    fn test_move_needs_ready_arm() {
        let mut arm = SimArm::new();
        arm.connect().unwrap();
        let target = JointVector([10.0, 0.0, 0.0, 0.0, 0.0]);

        assert_eq!(
            arm.set_servo_angle(&target, 10.0, true),
            Err(ArmError::Code(NOT_READY))
        );

        let mut arm = ready_arm();
        assert_eq!(arm.get_state(), Ok(REPORTED_READY));
        assert_eq!(arm.set_servo_angle(&target, 10.0, true), Ok(()));
        assert_eq!(arm.get_servo_angle(), Ok(target));
        assert_eq!(arm.moves(), vec![(target, 10.0)]);
    }

    #[test]
    fn test_move_rejects_out_of_range() {
        let mut arm = ready_arm();
        let target = JointVector([181.0, 0.0, 0.0, 0.0, 0.0]);

        assert_eq!(
            arm.set_servo_angle(&target, 10.0, true),
            Err(ArmError::Code(PARAM_ERROR))
        );
        assert_eq!(arm.angles_deg, JointVector::default());
    }

    #[test]
    fn test_fault_injection() {
        let mut arm = ready_arm();
        arm.inject_fault(ArmCall::GetState, 3);
        assert_eq!(arm.get_state(), Err(ArmError::Code(3)));
        arm.clear_fault(ArmCall::GetState);
        assert_eq!(arm.get_state(), Ok(REPORTED_READY));

        let mut arm = SimArm::new();
        arm.unreachable = true;
        assert!(matches!(arm.connect(), Err(ArmError::Transport(_))));
        assert!(!arm.is_connected());
    }

    #[test]
    fn test_dispatch_round_trip() {
        let mut arm = ready_arm();
        assert_eq!(
            ArmRequest::GetServoAngle.dispatch(&mut arm).into_angles(),
            Ok(JointVector::default())
        );

        arm.inject_fault(ArmCall::SetMode, 12);
        assert_eq!(
            ArmRequest::SetMode {
                mode: ArmMode::Position
            }
            .dispatch(&mut arm),
            ArmResponse::Done { code: 12 }
        );
    }
}
