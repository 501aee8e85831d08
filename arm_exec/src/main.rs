//! Main arm executable entry point.
//!
//! Connects to the arm through the arm bridge and lets an operator jog the joints from an
//! interactive menu.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{error, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

// Internal
use arm_lib::{
    arm_client::NetArm,
    console::TermConsole,
    menu::{self, ExitReason},
    params::ArmExecParams,
};
use comms_if::net::zmq;
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Parameter file, relative to the params directory.
const PARAMS_FILE: &str = "arm_exec.toml";

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("arm_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger, file only so the log doesn't get in the operator's way
    logger_init(LevelFilter::Debug, LevelFilter::Off, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Arm Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: ArmExecParams = match util::params::load(PARAMS_FILE) {
        Ok(p) => p,
        Err(e) if e.is_not_found() => {
            warn!("No {} parameter file, using defaults", PARAMS_FILE);
            ArmExecParams::default()
        }
        Err(e) => return Err(e).wrap_err("Could not load arm exec params"),
    };
    params
        .validate()
        .wrap_err("The arm exec params are invalid")?;

    info!("Exec parameters loaded: {:#?}", params);

    // ---- CTRL+C HANDLING ----

    // Prompts see Ctrl+C through the line editor. Anywhere else (a blocking move, the settle
    // wait) it only raises the stop flag, so the session still shuts down and disconnects.
    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        if stop_handler.swap(true, Ordering::SeqCst) {
            warn!("Second Ctrl+C, exiting without disconnecting");
            std::process::exit(130);
        }
        warn!("Ctrl+C received, stopping after the current operation");
        println!("\nStopping after the current operation, press Ctrl+C again to force exit");
    })
    .wrap_err("Failed to set the Ctrl+C handler")?;

    // ---- RUN ----

    let ctx = zmq::Context::new();
    let arm = NetArm::new(&ctx, &params);
    let mut console = TermConsole::new().wrap_err("Failed to open the terminal")?;

    match menu::run(arm, params, &mut console, &stop) {
        Ok(ExitReason::Exit) => info!("Operator exited"),
        Ok(reason) => info!("Session ended: {:?}", reason),
        // Already shown to the operator by the menu
        Err(e) => error!("Arm session failed: {}", e),
    }

    session.exit();

    Ok(())
}
