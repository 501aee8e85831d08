//! # Arm Simulator Executable
//!
//! Simulated arm bridge. Answers arm requests from an in-memory arm so that the arm executable
//! can be run without the real controller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm server abstraction.
mod arm_server;

/// Parameters for the arm simulator executable.
mod params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use comms_if::{eqpt::arm::sim::SimArm, net::zmq};
use log::{info, warn};
use structopt::StructOpt;

// Internal
use arm_server::{ArmServer, ArmServerError};
use params::ArmSimExecParams;
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command line options, overriding the parameter file.
#[derive(Debug, StructOpt)]
#[structopt(name = "arm_sim_exec", about = "Simulated arm bridge")]
struct Opts {
    /// Endpoint to bind to, e.g. "tcp://*:5020"
    #[structopt(short, long)]
    endpoint: Option<String>,

    /// Scale applied to the duration of blocking moves, 0 to complete them instantly
    #[structopt(short, long)]
    time_scale: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("arm_sim_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, LevelFilter::Info, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Arm Simulator Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut params: ArmSimExecParams = match util::params::load("arm_sim_exec.toml") {
        Ok(p) => p,
        Err(e) if e.is_not_found() => {
            warn!("No arm_sim_exec.toml parameter file, using defaults");
            ArmSimExecParams::default()
        }
        Err(e) => return Err(e).wrap_err("Could not load arm sim exec params"),
    };
    if let Some(endpoint) = opts.endpoint {
        params.endpoint = endpoint;
    }
    if let Some(scale) = opts.time_scale {
        params.motion_time_scale = scale;
    }

    info!("Parameters loaded: {:#?}", params);

    // ---- SERVER INITIALISATION ----

    let ctx = zmq::Context::new();
    let mut server =
        ArmServer::new(&ctx, &params.endpoint).wrap_err("Failed to initialise server")?;

    let mut arm = SimArm::at(params.initial_pos_deg);
    arm.motion_time_scale = params.motion_time_scale;

    info!("Serving the simulated arm on {}", params.endpoint);

    // ---- MAIN LOOP ----

    loop {
        match server.serve_one(&mut arm) {
            Ok(Some(call)) => {
                info!("Served {:?}, arm at {}", call, arm.angles_deg);
                // Only the latest state matters to a long running bridge
                arm.calls.clear();
            }
            Ok(None) => (),
            Err(e @ ArmServerError::DeserializeError(_)) => warn!("{}", e),
            Err(e) => return Err(e).wrap_err("Arm server failed"),
        }
    }
}
