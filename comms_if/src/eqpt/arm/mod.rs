//! # Arm Equipment Interface
//!
//! Data model and remote call interface for the arm controller. The controller itself is an
//! external collaborator; everything the rest of the software knows about it goes through the
//! [`ArmApi`] trait, either in-process (see [`sim::SimArm`]) or over the network via the arm
//! bridge request/response messages defined here.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// In-memory simulated arm controller.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The number of rotational joints on the arm.
pub const NUM_JOINTS: usize = 5;

/// Result code returned by the controller when a call succeeds.
pub const CODE_OK: i32 = 0;

/// Reported controller state which indicates the arm is ready for motion.
pub const REPORTED_READY: i32 = 0;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The remote calls offered by the arm controller.
///
/// Every call blocks until the controller answers. A non-zero controller result code is returned
/// as [`ArmError::Code`].
pub trait ArmApi {
    /// Open the connection to the controller.
    fn connect(&mut self) -> Result<(), ArmError>;

    /// Close the connection to the controller.
    fn disconnect(&mut self) -> Result<(), ArmError>;

    /// Clear any fault latched by the controller.
    fn clean_error(&mut self) -> Result<(), ArmError>;

    /// Enable or disable the joint motors.
    fn motion_enable(&mut self, enable: bool) -> Result<(), ArmError>;

    /// Switch the controller's motion mode.
    fn set_mode(&mut self, mode: ArmMode) -> Result<(), ArmError>;

    /// Command a controller state.
    fn set_state(&mut self, state: ArmState) -> Result<(), ArmError>;

    /// Move all joints to `angles_deg` at `speed_degs`.
    ///
    /// If `wait` is set the call only returns once the motion has completed.
    fn set_servo_angle(
        &mut self,
        angles_deg: &JointVector,
        speed_degs: f64,
        wait: bool,
    ) -> Result<(), ArmError>;

    /// Read the current joint angles.
    fn get_servo_angle(&mut self) -> Result<JointVector, ArmError>;

    /// Read the raw state reported by the controller, [`REPORTED_READY`] meaning ready.
    fn get_state(&mut self) -> Result<i32, ArmError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Angles of every arm joint, in degrees, ordered from the base outwards.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct JointVector(pub [f64; NUM_JOINTS]);

/// A 1-based joint number, guaranteed to be in `1..=NUM_JOINTS`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "usize", into = "usize")]
pub struct JointIndex(usize);

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors returned by arm remote calls.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ArmError {
    #[error("The controller returned error code {0}")]
    Code(i32),

    #[error("Not connected to the arm controller")]
    NotConnected,

    #[error("Could not reach the arm controller: {0}")]
    Transport(String),

    #[error("The controller sent an unexpected reply to {0:?}")]
    UnexpectedReply(ArmCall),
}

/// Motion modes of the controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmMode {
    /// Position control, required for servo angle commands.
    Position,

    /// Direct servo motion.
    Servo,

    /// Joint teaching (backdrivable) mode.
    JointTeaching,
}

/// States which can be commanded on the controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmState {
    Ready,
    Pause,
    Stop,
}

/// Identifies one of the remote calls, without its arguments.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmCall {
    Connect,
    Disconnect,
    CleanError,
    MotionEnable,
    SetMode,
    SetState,
    SetServoAngle,
    GetServoAngle,
    GetState,
}

/// A remote call sent from an arm client to the arm bridge.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ArmRequest {
    Connect,
    Disconnect,
    CleanError,
    MotionEnable { enable: bool },
    SetMode { mode: ArmMode },
    SetState { state: ArmState },
    SetServoAngle {
        angles_deg: JointVector,
        speed_degs: f64,
        wait: bool,
    },
    GetServoAngle,
    GetState,
}

/// The bridge's answer to an [`ArmRequest`].
///
/// `code` is the controller's result code, [`CODE_OK`] on success. Transport failures on the
/// bridge side are folded into the code as well since the client cannot act on them differently.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ArmResponse {
    Done { code: i32 },
    Angles { code: i32, angles_deg: Option<JointVector> },
    State { code: i32, state: Option<i32> },
}

/// Result code the bridge reports when the arm is not connected.
pub const CODE_NOT_CONNECTED: i32 = -1;

/// Result code the bridge reports when it cannot reach the controller.
pub const CODE_TRANSPORT: i32 = -3;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointVector {
    /// Angle of the given joint.
    pub fn get(&self, joint: JointIndex) -> f64 {
        self.0[joint.offset()]
    }

    /// Copy of this vector with `delta_deg` added to a single joint.
    pub fn with_delta(&self, joint: JointIndex, delta_deg: f64) -> Self {
        let mut angles = self.0;
        angles[joint.offset()] += delta_deg;
        Self(angles)
    }

    /// Largest absolute difference between any joint of the two vectors.
    pub fn max_travel_deg(&self, other: &JointVector) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Returns true if every angle is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|a| a.is_finite())
    }
}

impl fmt::Display for JointVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, a) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            // Round first so that small negative angles don't print as "-0.0"
            write!(f, "{:.1}", (a * 10.0).round() / 10.0 + 0.0)?;
        }
        write!(f, "]")
    }
}

impl JointIndex {
    /// Create a joint index from a 1-based joint number.
    ///
    /// Returns `None` if the number is outside `1..=NUM_JOINTS`.
    pub fn new(number: usize) -> Option<Self> {
        if (1..=NUM_JOINTS).contains(&number) {
            Some(Self(number))
        } else {
            None
        }
    }

    /// Iterate over every joint, base first.
    pub fn all() -> impl Iterator<Item = JointIndex> {
        (1..=NUM_JOINTS).map(JointIndex)
    }

    /// The 1-based joint number.
    pub fn number(&self) -> usize {
        self.0
    }

    /// Human readable joint name.
    pub fn name(&self) -> &'static str {
        match self.0 {
            1 => "Base",
            2 => "Shoulder",
            3 => "Elbow",
            4 => "Wrist1",
            _ => "Wrist2",
        }
    }

    /// Description of the positive rotation direction of the joint.
    pub fn positive_direction(&self) -> &'static str {
        match self.0 {
            1 => "clockwise (viewed from top)",
            2 => "forward tilt",
            3 => "upward bend",
            _ => "clockwise rotation",
        }
    }

    fn offset(&self) -> usize {
        self.0 - 1
    }
}

impl std::convert::TryFrom<usize> for JointIndex {
    type Error = String;

    fn try_from(number: usize) -> Result<Self, Self::Error> {
        JointIndex::new(number)
            .ok_or_else(|| format!("Joint number must be 1-{}, got {}", NUM_JOINTS, number))
    }
}

impl From<JointIndex> for usize {
    fn from(joint: JointIndex) -> Self {
        joint.0
    }
}

impl fmt::Display for JointIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ArmMode {
    /// The controller's numeric identifier for this mode.
    pub fn code(&self) -> i32 {
        match self {
            ArmMode::Position => 0,
            ArmMode::Servo => 1,
            ArmMode::JointTeaching => 2,
        }
    }
}

impl ArmState {
    /// The controller's numeric identifier for this state.
    pub fn code(&self) -> i32 {
        match self {
            ArmState::Ready => 0,
            ArmState::Pause => 3,
            ArmState::Stop => 4,
        }
    }
}

impl ArmRequest {
    /// The remote call this request performs.
    pub fn call(&self) -> ArmCall {
        match self {
            ArmRequest::Connect => ArmCall::Connect,
            ArmRequest::Disconnect => ArmCall::Disconnect,
            ArmRequest::CleanError => ArmCall::CleanError,
            ArmRequest::MotionEnable { .. } => ArmCall::MotionEnable,
            ArmRequest::SetMode { .. } => ArmCall::SetMode,
            ArmRequest::SetState { .. } => ArmCall::SetState,
            ArmRequest::SetServoAngle { .. } => ArmCall::SetServoAngle,
            ArmRequest::GetServoAngle => ArmCall::GetServoAngle,
            ArmRequest::GetState => ArmCall::GetState,
        }
    }

    /// Execute this request on the given arm, producing the response to send back to the client.
    pub fn dispatch<A: ArmApi + ?Sized>(self, arm: &mut A) -> ArmResponse {
        match self {
            ArmRequest::Connect => ArmResponse::done(arm.connect()),
            ArmRequest::Disconnect => ArmResponse::done(arm.disconnect()),
            ArmRequest::CleanError => ArmResponse::done(arm.clean_error()),
            ArmRequest::MotionEnable { enable } => ArmResponse::done(arm.motion_enable(enable)),
            ArmRequest::SetMode { mode } => ArmResponse::done(arm.set_mode(mode)),
            ArmRequest::SetState { state } => ArmResponse::done(arm.set_state(state)),
            ArmRequest::SetServoAngle {
                angles_deg,
                speed_degs,
                wait,
            } => ArmResponse::done(arm.set_servo_angle(&angles_deg, speed_degs, wait)),
            ArmRequest::GetServoAngle => match arm.get_servo_angle() {
                Ok(a) => ArmResponse::Angles {
                    code: CODE_OK,
                    angles_deg: Some(a),
                },
                Err(e) => ArmResponse::Angles {
                    code: e.code(),
                    angles_deg: None,
                },
            },
            ArmRequest::GetState => match arm.get_state() {
                Ok(s) => ArmResponse::State {
                    code: CODE_OK,
                    state: Some(s),
                },
                Err(e) => ArmResponse::State {
                    code: e.code(),
                    state: None,
                },
            },
        }
    }
}

impl ArmResponse {
    fn done(result: Result<(), ArmError>) -> Self {
        ArmResponse::Done {
            code: match result {
                Ok(()) => CODE_OK,
                Err(e) => e.code(),
            },
        }
    }

    /// The controller result code carried by this response.
    pub fn code(&self) -> i32 {
        match self {
            ArmResponse::Done { code }
            | ArmResponse::Angles { code, .. }
            | ArmResponse::State { code, .. } => *code,
        }
    }

    /// Interpret the response to a call which returns no data.
    pub fn into_done(self, call: ArmCall) -> Result<(), ArmError> {
        match self {
            ArmResponse::Done { code } => ArmError::check(code),
            _ => Err(ArmError::UnexpectedReply(call)),
        }
    }

    /// Interpret the response to [`ArmRequest::GetServoAngle`].
    pub fn into_angles(self) -> Result<JointVector, ArmError> {
        match self {
            ArmResponse::Angles {
                code: CODE_OK,
                angles_deg: Some(a),
            } => Ok(a),
            ArmResponse::Angles { code, .. } if code != CODE_OK => Err(ArmError::from_code(code)),
            _ => Err(ArmError::UnexpectedReply(ArmCall::GetServoAngle)),
        }
    }

    /// Interpret the response to [`ArmRequest::GetState`].
    pub fn into_state(self) -> Result<i32, ArmError> {
        match self {
            ArmResponse::State {
                code: CODE_OK,
                state: Some(s),
            } => Ok(s),
            ArmResponse::State { code, .. } if code != CODE_OK => Err(ArmError::from_code(code)),
            _ => Err(ArmError::UnexpectedReply(ArmCall::GetState)),
        }
    }
}

impl ArmError {
    /// Convert a controller result code into a result.
    pub fn check(code: i32) -> Result<(), ArmError> {
        match code {
            CODE_OK => Ok(()),
            c => Err(ArmError::from_code(c)),
        }
    }

    /// Build the error matching a non-zero result code.
    pub fn from_code(code: i32) -> ArmError {
        match code {
            CODE_NOT_CONNECTED => ArmError::NotConnected,
            c => ArmError::Code(c),
        }
    }

    /// The result code used to report this error over the wire.
    pub fn code(&self) -> i32 {
        match self {
            ArmError::Code(c) => *c,
            ArmError::NotConnected => CODE_NOT_CONNECTED,
            ArmError::Transport(_) | ArmError::UnexpectedReply(_) => CODE_TRANSPORT,
        }
    }
}

impl<T: ArmApi + ?Sized> ArmApi for &mut T {
    fn connect(&mut self) -> Result<(), ArmError> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<(), ArmError> {
        (**self).disconnect()
    }

    fn clean_error(&mut self) -> Result<(), ArmError> {
        (**self).clean_error()
    }

    fn motion_enable(&mut self, enable: bool) -> Result<(), ArmError> {
        (**self).motion_enable(enable)
    }

    fn set_mode(&mut self, mode: ArmMode) -> Result<(), ArmError> {
        (**self).set_mode(mode)
    }

    fn set_state(&mut self, state: ArmState) -> Result<(), ArmError> {
        (**self).set_state(state)
    }

    fn set_servo_angle(
        &mut self,
        angles_deg: &JointVector,
        speed_degs: f64,
        wait: bool,
    ) -> Result<(), ArmError> {
        (**self).set_servo_angle(angles_deg, speed_degs, wait)
    }

    fn get_servo_angle(&mut self) -> Result<JointVector, ArmError> {
        (**self).get_servo_angle()
    }

    fn get_state(&mut self) -> Result<i32, ArmError> {
        (**self).get_state()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
