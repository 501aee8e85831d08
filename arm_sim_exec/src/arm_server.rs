//! # Arm Server Module
//!
//! This module abstracts over the networking side of the simulated arm bridge. The server accepts
//! requests from an arm client and answers each of them from an [`ArmApi`] implementation.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::arm::{ArmApi, ArmCall, ArmRequest, ArmResponse, CODE_TRANSPORT},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};
use log::{debug, trace};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// REP server answering arm requests.
pub struct ArmServer {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`ArmServer`]
#[derive(thiserror::Error, Debug)]
pub enum ArmServerError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Could not recieve a request from the client: {0}")]
    RecvError(zmq::Error),

    #[error("Could not send the response to the client: {0}")]
    SendError(zmq::Error),

    #[error("Could not deserialize the request, the client was sent an error: {0}")]
    DeserializeError(serde_json::Error),

    #[error("Could not serialize the response: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmServer {
    /// Create a new server bound to `endpoint`.
    ///
    /// This function will not wait for a connection from the client before returning.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, ArmServerError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            recv_timeout: 200,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REP, socket_options, endpoint)?;

        Ok(Self { socket })
    }

    /// The endpoint the server is actually bound to, which resolves any wildcard port.
    pub fn endpoint(&self) -> Option<String> {
        self.socket.get_last_endpoint().ok().and_then(|e| e.ok())
    }

    /// Wait for a single request and answer it from `arm`.
    ///
    /// Returns `Ok(None)` if no request arrived within the receive timeout. A request which
    /// cannot be understood is still answered, with a transport error code, so the client is
    /// never left waiting.
    pub fn serve_one<A: ArmApi>(&mut self, arm: &mut A) -> Result<Option<ArmCall>, ArmServerError> {
        let msg = match self.socket.recv_msg(0) {
            Ok(m) => m,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(ArmServerError::RecvError(e)),
        };
        trace!("<- {:?}", msg.as_str());

        let request: ArmRequest = match serde_json::from_str(msg.as_str().unwrap_or("")) {
            Ok(r) => r,
            Err(e) => {
                self.respond(&ArmResponse::Done {
                    code: CODE_TRANSPORT,
                })?;
                return Err(ArmServerError::DeserializeError(e));
            }
        };

        let call = request.call();
        let response = request.dispatch(arm);
        debug!("{:?} -> code {}", call, response.code());

        self.respond(&response)?;

        Ok(Some(call))
    }

    fn respond(&mut self, response: &ArmResponse) -> Result<(), ArmServerError> {
        let resp_str =
            serde_json::to_string(response).map_err(ArmServerError::SerializationError)?;
        trace!("-> {}", resp_str);

        self.socket
            .send(&resp_str, 0)
            .map_err(ArmServerError::SendError)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use comms_if::eqpt::arm::{sim::SimArm, ArmError, JointVector};

    fn request(req: &zmq::Socket, msg: &str) -> ArmResponse {
        req.send(msg, 0).unwrap();
        serde_json::from_str(&req.recv_string(0).unwrap().unwrap()).unwrap()
    }

    #[test]
    fn test_serve_requests() {
        let ctx = zmq::Context::new();
        let mut server = ArmServer::new(&ctx, "tcp://127.0.0.1:*").unwrap();
        let endpoint = server.endpoint().unwrap();
        let mut arm = SimArm::at(JointVector([1.0, 2.0, 3.0, 4.0, 5.0]));

        // Nothing sent yet
        assert!(server.serve_one(&mut arm).unwrap().is_none());

        let req = ctx.socket(zmq::REQ).unwrap();
        req.set_rcvtimeo(2000).unwrap();
        req.connect(&endpoint).unwrap();

        let client = std::thread::spawn(move || {
            let connected = request(&req, &serde_json::to_string(&ArmRequest::Connect).unwrap());
            let angles = request(
                &req,
                &serde_json::to_string(&ArmRequest::GetServoAngle).unwrap(),
            );
            let garbage = request(&req, "not a request");
            (connected, angles, garbage)
        });

        let mut results = Vec::new();
        while results.len() < 3 {
            match server.serve_one(&mut arm) {
                Ok(Some(call)) => results.push(Ok(call)),
                Ok(None) => (),
                Err(e) => results.push(Err(e.to_string())),
            }
        }

        let (connected, angles, garbage) = client.join().unwrap();
        assert_eq!(connected.into_done(ArmCall::Connect), Ok(()));
        assert_eq!(
            angles.into_angles(),
            Ok(JointVector([1.0, 2.0, 3.0, 4.0, 5.0]))
        );
        assert_eq!(
            garbage.into_done(ArmCall::Connect),
            Err(ArmError::Code(CODE_TRANSPORT))
        );

        assert_eq!(results[0].as_ref().ok(), Some(&ArmCall::Connect));
        assert_eq!(results[1].as_ref().ok(), Some(&ArmCall::GetServoAngle));
        assert!(results[2].is_err());
        assert!(arm.is_connected());
    }
}
