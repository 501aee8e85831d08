//! # Arm Session
//!
//! Owns the connection to the arm controller for the lifetime of the executable and sequences the
//! remote calls needed to bring the arm up, jog it, send it home and release it again.
//!
//! The connection is released exactly once, either by [`ArmSession::shutdown`] or, on any other
//! exit path including unwinding, when the session is dropped.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod jog;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, warn};
use std::{thread, time::Duration};

// Internal
use crate::params::ArmExecParams;
use comms_if::eqpt::arm::{
    ArmApi, ArmCall, ArmError, ArmMode, ArmState, JointIndex, JointVector, REPORTED_READY,
};
pub use jog::JogError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A session with the arm controller.
pub struct ArmSession<A: ArmApi> {
    arm: A,

    params: ArmExecParams,

    released: bool,
}

/// What happened while bringing the arm up.
#[derive(Debug, Default)]
pub struct InitReport {
    /// State reported by the controller straight after connecting.
    pub initial_state: Option<i32>,

    /// State reported once the setup calls had settled.
    pub settled_state: Option<i32>,

    /// Set if the settled state wasn't ready and the error recovery calls were made.
    pub recovered: bool,

    /// Set if the arm reached the home position.
    pub homed: bool,

    /// Every call which failed during initialisation, in order.
    pub faults: Vec<SessionError>,
}

/// A completed joint jog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointMove {
    pub from: JointVector,
    pub to: JointVector,
    pub speed_degs: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur during an arm session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Could not connect to the arm controller: {0}")]
    Connect(ArmError),

    #[error("{call:?} failed: {source}")]
    Call { call: ArmCall, source: ArmError },

    #[error(transparent)]
    Jog(#[from] JogError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<A: ArmApi> ArmSession<A> {
    /// Create a new session. No remote calls are made until [`ArmSession::initialize`].
    pub fn new(arm: A, params: ArmExecParams) -> Self {
        Self {
            arm,
            params,
            released: false,
        }
    }

    /// The parameters this session was created with.
    pub fn params(&self) -> &ArmExecParams {
        &self.params
    }

    /// Connect to the controller, make it ready for motion and move to the home position.
    ///
    /// Only a failure to connect is returned as an error. Failures of the following calls are
    /// collected into the report and the session carries on, since an arm left half initialised
    /// is worse than one used cautiously.
    pub fn initialize(&mut self) -> Result<InitReport, SessionError> {
        info!("Connecting to the arm at {}", self.params.arm_endpoint);

        self.arm.connect().map_err(|e| {
            error!("Could not connect to the arm: {}", e);
            SessionError::Connect(e)
        })?;

        let mut report = InitReport::default();

        report.initial_state = self.attempt(&mut report, ArmCall::GetState, |a| a.get_state());
        info!("Initial arm state: {:?}", report.initial_state);

        info!("Clearing errors and enabling motion");
        self.attempt(&mut report, ArmCall::CleanError, |a| a.clean_error());
        self.attempt(&mut report, ArmCall::MotionEnable, |a| a.motion_enable(true));
        self.attempt(&mut report, ArmCall::SetMode, |a| a.set_mode(ArmMode::Position));
        self.attempt(&mut report, ArmCall::SetState, |a| a.set_state(ArmState::Ready));
        self.settle();

        report.settled_state = self.attempt(&mut report, ArmCall::GetState, |a| a.get_state());
        info!("Arm state after setup: {:?}", report.settled_state);

        if let Some(state) = report.settled_state {
            if state != REPORTED_READY {
                warn!("Arm reports state {} after setup, clearing errors", state);
                report.recovered = true;
                self.attempt(&mut report, ArmCall::CleanError, |a| a.clean_error());
                self.attempt(&mut report, ArmCall::SetState, |a| a.set_state(ArmState::Ready));
                self.settle();
            }
        }

        info!("Moving to the home position {}", self.params.home_pos_deg);
        let home = self.params.home_pos_deg;
        let speed = self.params.home_speed_degs;
        report.homed = self
            .attempt(&mut report, ArmCall::SetServoAngle, |a| {
                a.set_servo_angle(&home, speed, true)
            })
            .is_some();

        if report.faults.is_empty() {
            info!("Arm initialised");
        } else {
            warn!(
                "Arm initialised with {} fault(s), continuing in degraded mode",
                report.faults.len()
            );
        }

        Ok(report)
    }

    /// Read the current joint angles.
    pub fn read_position(&mut self) -> Result<JointVector, SessionError> {
        let angles = self.call(ArmCall::GetServoAngle, |a| a.get_servo_angle())?;
        debug!("Current position: {}", angles);
        Ok(angles)
    }

    /// Jog a single joint by `delta_deg` at `speed_degs`, blocking until the move is complete.
    ///
    /// The current angles are read fresh from the controller. Changes larger than the
    /// confirmation threshold are refused unless `confirmed` is set, targets beyond the joint
    /// limit are always refused, and the speed is clamped into the configured bounds. Exactly one
    /// move is commanded if the jog is accepted, none otherwise.
    pub fn apply_joint_delta(
        &mut self,
        joint: JointIndex,
        delta_deg: f64,
        speed_degs: f64,
        confirmed: bool,
    ) -> Result<JointMove, SessionError> {
        if !delta_deg.is_finite() {
            return Err(JogError::NonFinite("angle change").into());
        }

        let threshold_deg = self.params.confirm_threshold_deg;
        if jog::needs_confirmation(delta_deg, threshold_deg) && !confirmed {
            warn!("Refusing unconfirmed {} deg change of joint {}", delta_deg, joint);
            return Err(JogError::ConfirmationRequired {
                delta_deg,
                threshold_deg,
            }
            .into());
        }

        let from = self.read_position()?;

        let to = jog::plan_joint_delta(&from, joint, delta_deg, self.params.joint_limit_deg)
            .map_err(|e| {
                warn!("Refusing jog: {}", e);
                e
            })?;

        let speed_degs = jog::clamp_speed(
            speed_degs,
            self.params.min_speed_degs,
            self.params.max_speed_degs,
        )?;

        info!(
            "Moving joint {} by {} deg at {} deg/s: {} -> {}",
            joint, delta_deg, speed_degs, from, to
        );
        self.call(ArmCall::SetServoAngle, |a| {
            a.set_servo_angle(&to, speed_degs, true)
        })?;

        Ok(JointMove {
            from,
            to,
            speed_degs,
        })
    }

    /// Move the arm back to the home position, blocking until the move is complete.
    pub fn go_home(&mut self) -> Result<(), SessionError> {
        let home = self.params.home_pos_deg;
        let speed = self.params.home_speed_degs;

        info!("Moving to the home position {}", home);
        self.call(ArmCall::SetServoAngle, |a| a.set_servo_angle(&home, speed, true))
    }

    /// End the session, disconnecting from the controller.
    pub fn shutdown(mut self) {
        self.release();
    }

    /// Disconnect from the controller if that hasn't happened yet. Errors are ignored.
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        info!("Disconnecting from the arm");
        if let Err(e) = self.arm.disconnect() {
            debug!("Ignoring error while disconnecting: {}", e);
        }
    }

    /// Make a remote call, logging any failure.
    fn call<T, F>(&mut self, call: ArmCall, f: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut A) -> Result<T, ArmError>,
    {
        f(&mut self.arm).map_err(|source| {
            error!("{:?} failed: {}", call, source);
            SessionError::Call { call, source }
        })
    }

    /// Make a remote call during initialisation, recording rather than returning any failure.
    fn attempt<T, F>(&mut self, report: &mut InitReport, call: ArmCall, f: F) -> Option<T>
    where
        F: FnOnce(&mut A) -> Result<T, ArmError>,
    {
        match f(&mut self.arm) {
            Ok(t) => Some(t),
            Err(source) => {
                warn!("{:?} failed during initialisation: {}", call, source);
                report.faults.push(SessionError::Call { call, source });
                None
            }
        }
    }

    fn settle(&self) {
        if self.params.settle_time_s > 0.0 {
            thread::sleep(Duration::from_secs_f64(self.params.settle_time_s));
        }
    }
}

impl<A: ArmApi> Drop for ArmSession<A> {
    fn drop(&mut self) {
        self.release();
    }
}

impl InitReport {
    /// Returns true if any part of initialisation failed.
    pub fn is_degraded(&self) -> bool {
        !self.faults.is_empty()
    }
}

impl SessionError {
    /// The controller result code behind this error, if there is one.
    pub fn controller_code(&self) -> Option<i32> {
        match self {
            SessionError::Connect(ArmError::Code(c))
            | SessionError::Call {
                source: ArmError::Code(c),
                ..
            } => Some(*c),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
