//! # Arm Client
//!
//! This module provides networking abstractions to connect to the arm bridge, which forwards the
//! remote calls to the arm controller.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::arm::{ArmApi, ArmCall, ArmError, ArmMode, ArmRequest, ArmResponse, ArmState, JointVector},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::{debug, trace};

use crate::params::ArmExecParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An arm controller reached over the network through the arm bridge.
///
/// The socket is only created on [`ArmApi::connect`] and is dropped on
/// [`ArmApi::disconnect`].
pub struct NetArm {
    ctx: zmq::Context,

    endpoint: String,

    socket_options: SocketOptions,

    /// Largest joint angle the controller can be at, bounding the travel of any move.
    joint_limit_deg: f64,

    /// Time allowed for a blocking move reply on top of the motion itself.
    move_margin_ms: i32,

    socket: Option<MonitoredSocket>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ArmClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the bridge")]
    NotConnected,

    #[error("Could not set the reply timeout: {0}")]
    TimeoutError(zmq::Error),

    #[error("Could not send the request to the bridge: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a reply from the bridge: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the request: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the reply from the bridge: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NetArm {
    /// Create a new network arm. No connection is made until [`ArmApi::connect`] is called.
    pub fn new(ctx: &zmq::Context, params: &ArmExecParams) -> Self {
        let socket_options = SocketOptions {
            connect_timeout: params.connect_timeout_ms,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: params.call_timeout_ms,
            send_timeout: params.call_timeout_ms,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        Self {
            ctx: ctx.clone(),
            endpoint: params.arm_endpoint.clone(),
            socket_options,
            joint_limit_deg: params.joint_limit_deg,
            move_margin_ms: params.move_margin_ms,
            socket: None,
        }
    }

    /// Send a request to the bridge and wait up to `timeout_ms` for the reply.
    fn request(
        &mut self,
        request: &ArmRequest,
        timeout_ms: i32,
    ) -> Result<ArmResponse, ArmClientError> {
        let socket = self.socket.as_mut().ok_or(ArmClientError::NotConnected)?;

        if !socket.connected() {
            return Err(ArmClientError::NotConnected);
        }

        let req_str =
            serde_json::to_string(request).map_err(ArmClientError::SerializationError)?;

        socket
            .set_rcvtimeo(timeout_ms)
            .map_err(ArmClientError::TimeoutError)?;

        trace!("-> {}", req_str);
        socket
            .send(&req_str, 0)
            .map_err(ArmClientError::SendError)?;

        let msg = socket.recv_msg(0).map_err(ArmClientError::RecvError)?;
        trace!("<- {:?}", msg.as_str());

        serde_json::from_str(msg.as_str().unwrap_or("")).map_err(ArmClientError::DeserializeError)
    }

    /// Send a request which expects no data back.
    fn request_done(&mut self, request: ArmRequest) -> Result<(), ArmError> {
        let timeout_ms = self.socket_options.recv_timeout;
        let call = request.call();
        self.request(&request, timeout_ms)?.into_done(call)
    }
}

impl ArmApi for NetArm {
    fn connect(&mut self) -> Result<(), ArmError> {
        // Drop any previous socket before making a new one
        self.socket = None;

        debug!("Connecting to the arm bridge at {}", self.endpoint);
        let socket = MonitoredSocket::new(
            &self.ctx,
            zmq::REQ,
            self.socket_options.clone(),
            &self.endpoint,
        )
        .map_err(ArmClientError::SocketError)?;
        self.socket = Some(socket);

        let result = self.request_done(ArmRequest::Connect);
        if result.is_err() {
            self.socket = None;
        }
        result
    }

    fn disconnect(&mut self) -> Result<(), ArmError> {
        if self.socket.is_none() {
            return Ok(());
        }

        let result = self.request_done(ArmRequest::Disconnect);
        self.socket = None;
        result
    }

    fn clean_error(&mut self) -> Result<(), ArmError> {
        self.request_done(ArmRequest::CleanError)
    }

    fn motion_enable(&mut self, enable: bool) -> Result<(), ArmError> {
        self.request_done(ArmRequest::MotionEnable { enable })
    }

    fn set_mode(&mut self, mode: ArmMode) -> Result<(), ArmError> {
        self.request_done(ArmRequest::SetMode { mode })
    }

    fn set_state(&mut self, state: ArmState) -> Result<(), ArmError> {
        self.request_done(ArmRequest::SetState { state })
    }

    fn set_servo_angle(
        &mut self,
        angles_deg: &JointVector,
        speed_degs: f64,
        wait: bool,
    ) -> Result<(), ArmError> {
        let timeout_ms = match wait {
            true => move_reply_timeout_ms(
                angles_deg,
                speed_degs,
                self.joint_limit_deg,
                self.move_margin_ms,
            ),
            false => self.socket_options.recv_timeout,
        };
        let request = ArmRequest::SetServoAngle {
            angles_deg: *angles_deg,
            speed_degs,
            wait,
        };

        self.request(&request, timeout_ms)?
            .into_done(ArmCall::SetServoAngle)
    }

    fn get_servo_angle(&mut self) -> Result<JointVector, ArmError> {
        let timeout_ms = self.socket_options.recv_timeout;
        self.request(&ArmRequest::GetServoAngle, timeout_ms)?
            .into_angles()
    }

    fn get_state(&mut self) -> Result<i32, ArmError> {
        let timeout_ms = self.socket_options.recv_timeout;
        self.request(&ArmRequest::GetState, timeout_ms)?
            .into_state()
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Time to wait for the reply to a blocking move to `target_deg` at `speed_degs`.
///
/// The current angles aren't known here, but every joint starts within `limit_deg` of zero, so
/// no joint can travel further than `|target| + limit_deg`. The reply must wait for the whole
/// motion, so the timeout covers that worst case plus `margin_ms`. Speeds the controller will
/// reject straight away only get the margin.
pub fn move_reply_timeout_ms(
    target_deg: &JointVector,
    speed_degs: f64,
    limit_deg: f64,
    margin_ms: i32,
) -> i32 {
    if !(speed_degs > 0.0) || !speed_degs.is_finite() {
        return margin_ms;
    }

    let max_travel_deg = target_deg
        .0
        .iter()
        .map(|a| a.abs() + limit_deg)
        .fold(0.0, f64::max);

    let timeout_ms = (max_travel_deg / speed_degs * 1000.0).ceil() + margin_ms as f64;

    if timeout_ms.is_finite() && timeout_ms < i32::MAX as f64 {
        timeout_ms as i32
    } else {
        // Wait for as long as it takes
        -1
    }
}

impl From<ArmClientError> for ArmError {
    fn from(e: ArmClientError) -> Self {
        match e {
            ArmClientError::NotConnected => ArmError::NotConnected,
            e => ArmError::Transport(e.to_string()),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use comms_if::eqpt::arm::sim::SimArm;
    use std::thread;

    /// Serve `num_requests` requests on a loopback REP socket from a simulated arm, returning the
    /// endpoint and a handle which yields the arm once done.
    fn spawn_bridge(
        ctx: &zmq::Context,
        num_requests: usize,
    ) -> (String, thread::JoinHandle<SimArm>) {
        let rep = ctx.socket(zmq::REP).unwrap();
        rep.bind("tcp://127.0.0.1:*").unwrap();
        let endpoint = rep.get_last_endpoint().unwrap().unwrap();

        let handle = thread::spawn(move || {
            let mut arm = SimArm::new();
            for _ in 0..num_requests {
                let msg = rep.recv_string(0).unwrap().unwrap();
                let request: ArmRequest = serde_json::from_str(&msg).unwrap();
                let response = request.dispatch(&mut arm);
                rep.send(&serde_json::to_string(&response).unwrap(), 0)
                    .unwrap();
            }
            arm
        });

        (endpoint, handle)
    }

    #[test]
    fn test_move_reply_timeout_covers_slowest_move() {
        let margin_ms = 10_000;

        // Joint 1 from -180 to 150 at the slowest speed takes 330 s
        let target = JointVector([150.0, 0.0, 0.0, 0.0, 0.0]);
        let timeout_ms = move_reply_timeout_ms(&target, 1.0, 180.0, margin_ms);
        assert_eq!(timeout_ms, 330_000 + margin_ms);

        // A home move from anywhere must fit as well
        let home = JointVector([103.7, -24.3, -1.9, 26.2, 14.8]);
        let from = JointVector([-180.0, 180.0, 180.0, -180.0, -180.0]);
        let timeout_ms = move_reply_timeout_ms(&home, 10.0, 180.0, margin_ms);
        assert!(timeout_ms as f64 >= home.max_travel_deg(&from) / 10.0 * 1000.0 + margin_ms as f64);

        // Faster moves wait less
        assert!(move_reply_timeout_ms(&target, 30.0, 180.0, margin_ms) < timeout_ms);

        assert_eq!(move_reply_timeout_ms(&target, 0.0, 180.0, margin_ms), margin_ms);
        assert_eq!(
            move_reply_timeout_ms(&target, std::f64::NAN, 180.0, margin_ms),
            margin_ms
        );
        assert_eq!(move_reply_timeout_ms(&target, 1e-9, 180.0, margin_ms), -1);
    }

    #[test]
    fn test_calls_over_network() {
        let ctx = zmq::Context::new();
        let (endpoint, handle) = spawn_bridge(&ctx, 4);

        let params = ArmExecParams {
            arm_endpoint: endpoint,
            ..Default::default()
        };
        let mut arm = NetArm::new(&ctx, &params);

        assert_eq!(arm.get_state(), Err(ArmError::NotConnected));
        arm.connect().unwrap();
        assert_eq!(arm.get_servo_angle(), Ok(JointVector::default()));
        // The simulated arm isn't enabled so refuses to move
        assert!(matches!(
            arm.set_servo_angle(&JointVector::default(), 5.0, true),
            Err(ArmError::Code(_))
        ));
        arm.disconnect().unwrap();
        assert_eq!(arm.disconnect(), Ok(()));

        let sim = handle.join().unwrap();
        let calls: Vec<ArmCall> = sim.calls.iter().map(|r| r.call()).collect();
        assert_eq!(
            calls,
            vec![
                ArmCall::Connect,
                ArmCall::GetServoAngle,
                ArmCall::SetServoAngle,
                ArmCall::Disconnect
            ]
        );
        assert!(!sim.is_connected());
    }
}
