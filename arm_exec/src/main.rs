//! Main arm-side executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Joint status and arm commands are received on the bus thread
//!         - Arm control processing on the head of the command queue
//!         - Joint demands and telemetry published
//!
//! # Modules
//!
//! All modules (e.g. `arm_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::info;
use std::sync::Arc;
use structopt::StructOpt;

// Internal
use arm_lib::{
    arm_client::ArmClient,
    arm_ctrl::{self, ArmCtrl},
    control_loop::ControlLoop,
    params::ArmExecParams,
};
use comms_if::net::{zmq, MessageBus, ZmqBus};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "arm_exec", about = "Arm controller executable")]
struct Opts {
    /// Executable parameter file, relative to the params directory
    #[structopt(long, default_value = "arm_exec.toml")]
    exec_params: String,

    /// Arm control parameter file, relative to the params directory
    #[structopt(long, default_value = "arm_ctrl.toml")]
    arm_ctrl_params: String,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("arm_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Bolt Arm Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: ArmExecParams =
        util::params::load(&opts.exec_params).wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    let mut arm_ctrl = ArmCtrl::default();
    arm_ctrl
        .init(
            arm_ctrl::InitData {
                params_file: opts.arm_ctrl_params.clone(),
                cycle_frequency_hz: exec_params.cycle_frequency_hz,
            },
            &session,
        )
        .wrap_err("Failed to initialise ArmCtrl")?;

    info!("ArmCtrl initialised");

    // ---- INITIALISE NETWORK ----

    let zmq_ctx = zmq::Context::new();

    let bus: Arc<dyn MessageBus> = Arc::new(
        ZmqBus::new(&zmq_ctx, &exec_params.bus).wrap_err("Failed to initialise the bus")?,
    );

    let client = ArmClient::new(bus.as_ref(), &exec_params.status_cache)
        .wrap_err("Failed to subscribe to the arm inputs")?;

    info!("Network initialised");

    // ---- MAIN LOOP ----

    let mut control_loop = ControlLoop::new(arm_ctrl, client, bus, exec_params.cycle_frequency_hz)
        .wrap_err("Failed to create the control loop")?;

    info!("Beginning main loop\n");

    control_loop.run().wrap_err("Error during arm control processing")?;

    Ok(())
}
