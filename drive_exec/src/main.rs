//! # Drive Control Executable
//!
//! This executable listens for drive commands on a UDP socket and drives the left and right motors
//! accordingly. If no valid command arrives within the watchdog timeout the motors are stopped
//! until commands resume.
//!
//! The executable runs until interrupted (Ctrl-C), at which point the motors are stopped and the
//! socket is closed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use log::info;
use color_eyre::{Result, eyre::WrapErr};

// Internal
use drive_lib::{
    drive_loop::DriveLoop,
    drive_server::DriveServer,
    motor_ctrl::{self, DriveCtrl},
    params::DriveExecParams,
    watchdog::SystemClock,
};
use util::{
    host,
    logger::logger_init,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "drive_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // ---- LOAD PARAMETERS ----

    let params: DriveExecParams = util::params::load("drive_exec.toml")
        .wrap_err("Could not load drive_exec params")?;
    params.validate()
        .wrap_err("Invalid drive_exec params")?;

    // Initialise logger
    logger_init(params.log_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Drive Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    info!("Parameters loaded: {:#?}", params);

    info!("Initialising...");

    // ---- SHUTDOWN HANDLER ----

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::Relaxed))
            .wrap_err("Failed to install the Ctrl-C handler")?;
    }

    // ---- MOTOR INITIALISATION ----

    let (left, right) = motor_ctrl::init_motors(&params.motors)
        .wrap_err("Failed to initialise the motors")?;
    let drive = DriveCtrl::new(left, right);

    info!(
        "Motors initialised ({})",
        if params.motors.simulated { "simulated" } else { "MX1508" }
    );

    // ---- SERVER INITIALISATION ----

    let server = DriveServer::new(params.socket_addr(), params.recv_timeout())
        .wrap_err("Failed to initialise server")?;

    info!(
        "Server listening on {}",
        server.local_addr().wrap_err("Failed to get the server address")?
    );

    // ---- MAIN LOOP ----

    info!("Initialisation complete, entering main loop\n");

    let mut drive_loop = DriveLoop::new(server, drive, SystemClock, params.loop_config());
    let result = drive_loop.run(&shutdown);

    // ---- SHUTDOWN ----

    let stats = *drive_loop.stats();
    info!("Loop statistics: {:#?}", stats);
    session.save("drive_loop_stats.json", stats);

    // Dropping the loop closes the socket and stops the motors again
    drop(drive_loop);
    info!("Socket closed, motors stopped");

    session.exit();

    result.wrap_err("Drive loop failed")?;

    info!("End of execution");

    Ok(())
}
